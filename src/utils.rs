// Utility functions

/// Extracts the trailing path segment of a Spotify URL or row href,
/// i.e. the track/playlist id. Query strings and fragments are ignored.
pub fn id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://open.spotify.com/playlist/{playlist_id}")
}

pub fn track_url(track_id: &str) -> String {
    format!("https://open.spotify.com/track/{track_id}")
}

/// Makes a track title safe to use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_plain_href() {
        assert_eq!(id_from_url("/track/3n3Ppam7vgaVa1iaRUc9Lp"), Some("3n3Ppam7vgaVa1iaRUc9Lp"));
    }

    #[test]
    fn id_from_full_url_with_query() {
        assert_eq!(
            id_from_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc123"),
            Some("37i9dQZF1DXcBWIGoYBM5M")
        );
    }

    #[test]
    fn id_from_trailing_slash() {
        assert_eq!(id_from_url("https://open.spotify.com/track/abc/"), Some("abc"));
    }

    #[test]
    fn id_from_empty() {
        assert_eq!(id_from_url(""), None);
        assert_eq!(id_from_url("/"), None);
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_filename("AC/DC: Back \"in\" Black?"), "AC_DC_ Back _in_ Black_");
    }
}
