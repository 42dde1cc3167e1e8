//! Release API response shapes (only the fields we read).

use serde::Deserialize;

/// `GET /releases/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRelease {
    pub tag_name: String,
}

/// `GET /git/ref/tags/{tag}`
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub object: GitRefObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRefObject {
    pub sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_latest_release_ignoring_extra_fields() {
        let json = r#"{"tag_name":"v5.0.0","name":"Release 5","draft":false}"#;
        let r: LatestRelease = serde_json::from_str(json).unwrap();
        assert_eq!(r.tag_name, "v5.0.0");
    }

    #[test]
    fn parses_git_ref() {
        let json = r#"{"ref":"refs/tags/v5.0.0","object":{"sha":"abc1234def","type":"commit"}}"#;
        let r: GitRef = serde_json::from_str(json).unwrap();
        assert_eq!(r.object.sha, "abc1234def");
    }
}
