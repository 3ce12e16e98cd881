//! The canonical sparkify pipeline.
//!
//! ```text
//! begin_execution
//!   -> create_staging_tables
//!   -> stage_events, stage_songs
//!   -> load_songplays_fact_table
//!   -> load_user/song/artist/time_dim_table
//!   -> run_data_quality_checks
//!   -> stop_execution
//! ```

use loadstar_config::{DefaultArgs, LoadstarConfig};

use crate::error::Result;
use crate::operators::{
    DimensionLoader, ExternalDataLocation, FactLoader, JsonFormat, Marker, QualityChecker,
    QualitySpec, SqlTask, StagingLoader,
};
use crate::pipeline::Pipeline;
use crate::queries;

pub const PIPELINE_NAME: &str = "sparkify";
pub const SOURCE_BUCKET: &str = "udacity-dend";
pub const SOURCE_REGION: &str = "us-west-2";
/// Event logs are partitioned by the run's logical month.
pub const EVENTS_KEY: &str = "log_data/{year}/{month}";
pub const SONGS_KEY: &str = "song_data";
pub const CREDENTIALS_ID: &str = "aws_credentials";
pub const EVENTS_JSONPATHS: &str = "s3://udacity-dend/log_json_path.json";

const DIMENSIONS: [(&str, &str, &str); 4] = [
    ("load_user_dim_table", "users", queries::USER_TABLE_INSERT),
    ("load_song_dim_table", "songs", queries::SONG_TABLE_INSERT),
    ("load_artist_dim_table", "artists", queries::ARTIST_TABLE_INSERT),
    ("load_time_dim_table", "time", queries::TIME_TABLE_INSERT),
];

/// Quality gates run after every table is loaded.
pub fn quality_checks() -> Vec<QualitySpec> {
    vec![
        QualitySpec::new("songplays", "playid"),
        QualitySpec::new("users", "userid"),
        QualitySpec::new("songs", "songid"),
        QualitySpec::new("artists", "artistid"),
        QualitySpec::new("time", "start_time"),
    ]
}

/// Build the sparkify pipeline with built-in defaults.
pub fn sparkify_pipeline() -> Result<Pipeline> {
    sparkify_pipeline_with(&LoadstarConfig::new())
}

/// Build the sparkify pipeline, taking defaults, bucket and region from
/// `config` where set.
///
/// With an empty config this issues the same statements as
/// `pipelines/sparkify.toml`.
pub fn sparkify_pipeline_with(config: &LoadstarConfig) -> Result<Pipeline> {
    let storage = config.storage();
    let bucket = storage.bucket.as_deref().unwrap_or(SOURCE_BUCKET);
    let region = storage.region.as_deref().unwrap_or(SOURCE_REGION);
    let defaults: DefaultArgs = config.defaults();

    let stage_events = StagingLoader::new(
        "stage_events",
        "staging_events",
        ExternalDataLocation::new(bucket, EVENTS_KEY),
        CREDENTIALS_ID,
        JsonFormat::JsonPaths(EVENTS_JSONPATHS.to_string()),
    )?
    .with_region(region);
    let stage_songs = StagingLoader::new(
        "stage_songs",
        "staging_songs",
        ExternalDataLocation::new(bucket, SONGS_KEY),
        CREDENTIALS_ID,
        JsonFormat::Auto,
    )?
    .with_region(region);

    let mut builder = Pipeline::builder(PIPELINE_NAME)
        .description("Load and transform song play data in the warehouse")
        .defaults(defaults)
        .task(Marker::new("begin_execution")?, &[])
        .task(
            SqlTask::new(
                "create_staging_tables",
                [queries::CREATE_STAGING_EVENTS, queries::CREATE_STAGING_SONGS],
            )?,
            &["begin_execution"],
        )
        .task(stage_events, &["create_staging_tables"])
        .task(stage_songs, &["create_staging_tables"])
        .task(
            FactLoader::new(
                "load_songplays_fact_table",
                "songplays",
                queries::SONGPLAY_TABLE_INSERT,
            )?,
            &["stage_events", "stage_songs"],
        );

    for (task_id, table, select) in DIMENSIONS {
        builder = builder.task(
            DimensionLoader::new(task_id, table, select)?,
            &["load_songplays_fact_table"],
        );
    }

    let dimension_ids: Vec<&str> = DIMENSIONS.iter().map(|(id, _, _)| *id).collect();
    builder
        .task(
            QualityChecker::new("run_data_quality_checks", quality_checks())?,
            &dimension_ids,
        )
        .task(Marker::new("stop_execution")?, &["run_data_quality_checks"])
        .build()
}
