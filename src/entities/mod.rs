pub mod artist;
pub mod radio_station;
pub mod station_track;
pub mod track;
