//! SQL for the sparkify star schema.
//!
//! Staging DDL plus the SELECT expressions the fact and dimension loaders
//! insert from. Table and column names follow the raw event/song JSON.

pub const CREATE_STAGING_EVENTS: &str = r#"CREATE TABLE IF NOT EXISTS public.staging_events (
    artist VARCHAR(256),
    auth VARCHAR(256),
    firstname VARCHAR(256),
    gender VARCHAR(256),
    iteminsession INT4,
    lastname VARCHAR(256),
    length NUMERIC(18,0),
    "level" VARCHAR(256),
    location VARCHAR(256),
    "method" VARCHAR(256),
    page VARCHAR(256),
    registration NUMERIC(18,0),
    sessionid INT4,
    song VARCHAR(256),
    status INT4,
    ts INT8,
    useragent VARCHAR(256),
    userid INT4
)"#;

pub const CREATE_STAGING_SONGS: &str = r#"CREATE TABLE IF NOT EXISTS public.staging_songs (
    num_songs INT4,
    artist_id VARCHAR(256),
    artist_name VARCHAR(256),
    artist_latitude NUMERIC(18,0),
    artist_longitude NUMERIC(18,0),
    artist_location VARCHAR(256),
    song_id VARCHAR(256),
    title VARCHAR(256),
    duration NUMERIC(18,0),
    "year" INT4
)"#;

pub const SONGPLAY_TABLE_INSERT: &str = r#"
    SELECT
        md5(events.sessionid || events.start_time) playid,
        events.start_time,
        events.userid,
        events.level,
        songs.song_id,
        songs.artist_id,
        events.sessionid,
        events.location,
        events.useragent
    FROM (SELECT TIMESTAMP 'epoch' + ts/1000 * interval '1 second' AS start_time, *
          FROM staging_events
          WHERE page = 'NextSong') events
    LEFT JOIN staging_songs songs
        ON events.song = songs.title
        AND events.artist = songs.artist_name
        AND events.length = songs.duration
"#;

pub const USER_TABLE_INSERT: &str = r#"
    SELECT DISTINCT userid, firstname, lastname, gender, level
    FROM staging_events
    WHERE page = 'NextSong'
"#;

pub const SONG_TABLE_INSERT: &str = r#"
    SELECT DISTINCT song_id, title, artist_id, year, duration
    FROM staging_songs
"#;

pub const ARTIST_TABLE_INSERT: &str = r#"
    SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
    FROM staging_songs
"#;

pub const TIME_TABLE_INSERT: &str = r#"
    SELECT start_time, extract(hour from start_time), extract(day from start_time),
           extract(week from start_time), extract(month from start_time),
           extract(year from start_time), extract(dayofweek from start_time)
    FROM songplays
"#;

/// Look up a canonical select by name, as used in pipeline files
/// (`select = "@users"`).
pub fn named_select(name: &str) -> Option<&'static str> {
    match name {
        "songplays" => Some(SONGPLAY_TABLE_INSERT),
        "users" => Some(USER_TABLE_INSERT),
        "songs" => Some(SONG_TABLE_INSERT),
        "artists" => Some(ARTIST_TABLE_INSERT),
        "time" => Some(TIME_TABLE_INSERT),
        _ => None,
    }
}

/// Look up canonical DDL by name (`statements = ["@staging_events"]`).
pub fn named_ddl(name: &str) -> Option<&'static str> {
    match name {
        "staging_events" => Some(CREATE_STAGING_EVENTS),
        "staging_songs" => Some(CREATE_STAGING_SONGS),
        _ => None,
    }
}
