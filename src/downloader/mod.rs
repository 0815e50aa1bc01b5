// RapidAPI spotify-scraper client: track metadata, audio download, tagging.
use crate::model::{FetchError, TrackInfo};
use crate::utils::sanitize_filename;
use id3::{Content, Frame, Tag, TagLike, Version, frame::Picture, frame::PictureType};
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const RAPIDAPI_HOST: &str = "spotify-scraper.p.rapidapi.com";
const DOWNLOAD_ENDPOINT: &str =
    "https://spotify-scraper.p.rapidapi.com/v1/track/download/soundcloud";
const LYRICS_ENDPOINT: &str = "https://spotify-scraper.p.rapidapi.com/v1/track/lyrics";

pub struct TrackFetcher {
    client: Client,
    api_key: String,
}

impl TrackFetcher {
    pub fn new(api_key: String) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, api_key })
    }

    /// Resolves a track id to its metadata and a downloadable audio URL.
    pub async fn lookup(&self, track_id: &str) -> Result<TrackInfo, FetchError> {
        debug!("looking up track {}", track_id);
        let payload: Value = self
            .client
            .get(DOWNLOAD_ENDPOINT)
            .query(&[("track", track_id), ("quality", "hq")])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .send()
            .await?
            .json()
            .await?;
        parse_track_payload(track_id, &payload)
    }

    /// Downloads the audio (and cover art) for a resolved track into `dir`,
    /// embedding ID3 tags for mp3 files. Returns the audio file path.
    pub async fn download(&self, info: &TrackInfo, dir: &Path) -> Result<PathBuf, FetchError> {
        tokio::fs::create_dir_all(dir).await?;
        let stem = sanitize_filename(&info.title);
        let path = dir.join(format!("{}.{}", stem, info.format));

        info!("downloading {} by {} -> {}", info.title, info.artists, path.display());
        let audio = self
            .client
            .get(&info.audio_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(&path, &audio).await?;

        let mut cover_bytes = None;
        if let Some(cover_url) = &info.cover_url {
            let covers_dir = dir.join("covers");
            tokio::fs::create_dir_all(&covers_dir).await?;
            let bytes = self
                .client
                .get(cover_url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            tokio::fs::write(covers_dir.join(format!("{}.jpg", stem)), &bytes).await?;
            cover_bytes = Some(bytes.to_vec());
        }

        apply_tags(&path, info, cover_bytes.as_deref())?;

        Ok(path)
    }

    /// Fetches lyrics for a track, line-joined.
    pub async fn lyrics(&self, track_id: &str) -> Result<String, FetchError> {
        let payload: Value = self
            .client
            .get(LYRICS_ENDPOINT)
            .query(&[("trackId", track_id), ("format", "json")])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .send()
            .await?
            .json()
            .await?;
        Ok(lyrics_from_payload(&payload))
    }
}

fn parse_track_payload(track_id: &str, payload: &Value) -> Result<TrackInfo, FetchError> {
    let audio = &payload["soundcloudTrack"]["audio"][0];
    let title = payload["soundcloudTrack"]["title"]
        .as_str()
        .ok_or(FetchError::MissingField("soundcloudTrack.title"))?;
    let audio_url = audio["url"]
        .as_str()
        .ok_or(FetchError::MissingField("soundcloudTrack.audio[0].url"))?;
    let format = audio["format"]
        .as_str()
        .ok_or(FetchError::MissingField("soundcloudTrack.audio[0].format"))?;
    let artists = payload["spotifyTrack"]["artists"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|a| a["name"].as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|names| !names.is_empty())
        .ok_or(FetchError::MissingField("spotifyTrack.artists"))?;
    let cover_url = payload["spotifyTrack"]["album"]["cover"]
        .as_array()
        .and_then(|covers| covers.last())
        .and_then(|c| c["url"].as_str())
        .map(String::from);
    let duration = audio["durationText"].as_str().map(String::from);

    Ok(TrackInfo {
        id: track_id.to_string(),
        title: title.to_string(),
        artists,
        audio_url: audio_url.to_string(),
        format: format.to_string(),
        duration,
        cover_url,
    })
}

fn lyrics_from_payload(payload: &Value) -> String {
    // The API answers {"status": false} when it has no lyrics, and a plain
    // array of line objects otherwise.
    if payload.get("status").and_then(Value::as_bool) == Some(false) {
        return "Lyrics not found! 🤕".to_string();
    }
    payload
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn apply_tags(path: &Path, info: &TrackInfo, cover: Option<&[u8]>) -> Result<(), FetchError> {
    match info.format.to_ascii_lowercase().as_str() {
        "mp3" => tag_mp3(path, info, cover),
        "m4a" => tag_m4a(path, info, cover),
        other => {
            debug!("no tag support for format {}, leaving file as-is", other);
            Ok(())
        }
    }
}

fn tag_mp3(path: &Path, info: &TrackInfo, cover: Option<&[u8]>) -> Result<(), FetchError> {
    let mut tag = Tag::new();
    tag.set_title(&info.title);
    tag.set_artist(&info.artists);
    if let Some(data) = cover {
        tag.add_frame(Frame::with_content(
            "APIC",
            Content::Picture(Picture {
                mime_type: "image/jpeg".to_string(),
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data: data.to_vec(),
            }),
        ));
    }
    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}

fn tag_m4a(path: &Path, info: &TrackInfo, cover: Option<&[u8]>) -> Result<(), FetchError> {
    let mut tag = mp4ameta::Tag::read_from_path(path)?;
    tag.set_title(&info.title);
    tag.set_artist(&info.artists);
    if let Some(data) = cover {
        tag.set_artwork(mp4ameta::Img::jpeg(data.to_vec()));
    }
    tag.write_to_path(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "soundcloudTrack": {
                "title": "Paranoid",
                "audio": [
                    {"url": "https://cdn.example/p.mp3", "format": "mp3", "durationText": "2:48"}
                ]
            },
            "spotifyTrack": {
                "artists": [{"name": "Black Sabbath"}],
                "album": {"cover": [
                    {"url": "https://img.example/small.jpg"},
                    {"url": "https://img.example/large.jpg"}
                ]}
            }
        })
    }

    #[test]
    fn parses_complete_payload() {
        let info = parse_track_payload("abc123", &sample_payload()).unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.title, "Paranoid");
        assert_eq!(info.artists, "Black Sabbath");
        assert_eq!(info.audio_url, "https://cdn.example/p.mp3");
        assert_eq!(info.format, "mp3");
        assert_eq!(info.duration.as_deref(), Some("2:48"));
        // Last (largest) cover wins.
        assert_eq!(info.cover_url.as_deref(), Some("https://img.example/large.jpg"));
    }

    #[test]
    fn multiple_artists_are_joined() {
        let mut payload = sample_payload();
        payload["spotifyTrack"]["artists"] =
            json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]);
        let info = parse_track_payload("x", &payload).unwrap();
        assert_eq!(info.artists, "A, B, C");
    }

    #[test]
    fn missing_audio_url_is_an_error() {
        let mut payload = sample_payload();
        payload["soundcloudTrack"]["audio"] = json!([]);
        let err = parse_track_payload("x", &payload).unwrap_err();
        assert!(matches!(err, FetchError::MissingField(_)));
    }

    fn sample_info(format: &str) -> TrackInfo {
        TrackInfo {
            id: "x".to_string(),
            title: "Paranoid".to_string(),
            artists: "Black Sabbath".to_string(),
            audio_url: "https://cdn.example/p".to_string(),
            format: format.to_string(),
            duration: None,
            cover_url: None,
        }
    }

    #[test]
    fn unknown_formats_skip_tagging() {
        let info = sample_info("wav");
        assert!(apply_tags(Path::new("/nope/missing.wav"), &info, None).is_ok());
    }

    #[test]
    fn mp3_and_m4a_reach_their_taggers() {
        // Both taggers hit the filesystem, so a missing file surfaces as an
        // error instead of the skip path.
        for fmt in ["mp3", "M4A", "m4a"] {
            let info = sample_info(fmt);
            assert!(apply_tags(Path::new("/nope/missing.audio"), &info, None).is_err());
        }
    }

    #[test]
    fn lyrics_lines_are_joined() {
        let payload = json!([{"text": "line one"}, {"text": "line two"}]);
        assert_eq!(lyrics_from_payload(&payload), "line one\nline two");
    }

    #[test]
    fn empty_lyrics_payload_yields_empty_string() {
        assert_eq!(lyrics_from_payload(&json!([])), "");
    }

    #[test]
    fn lyrics_absent_status() {
        let payload = json!({"status": false});
        assert_eq!(lyrics_from_payload(&payload), "Lyrics not found! 🤕");
    }
}
