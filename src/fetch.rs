//! Downloads each record's remote image into the images directory.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tracing::{error, info, warn};
use url::Url;

use crate::{
    catalog::RecordId,
    config::FetchSettings,
    store::{self, CatalogStore},
};

/// Basename used when a URL path ends without one.
const FALLBACK_BASENAME: &str = "image.jpg";

pub trait Client {
    type Error: std::fmt::Display + std::fmt::Debug;
    fn get(&self, url: &Url) -> impl Future<Output = Result<Bytes, Self::Error>>;
}

/// `reqwest` client carrying the fixed user agent and per-request timeout.
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .build()?;
        Ok(Self { client })
    }
}

impl Client for HttpClient {
    type Error = reqwest::Error;

    async fn get(&self, url: &Url) -> Result<Bytes, Self::Error> {
        self.client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Catalog(#[from] store::Error),
    #[error("no wines found in catalog")]
    EmptyCatalog,
    #[error("failed to create images directory ({path:?}): {error}")]
    CreateDir {
        error: std::io::Error,
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError<E> {
    #[error("invalid image URL ({url}): {error}")]
    InvalidUrl { error: url::ParseError, url: String },
    #[error("failed to download ({url}): {error}")]
    Transport { error: E, url: Url },
    #[error("failed to write image ({path:?}): {error}")]
    Write {
        error: std::io::Error,
        path: PathBuf,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// `wine_{id}_{basename}` where basename is the percent-decoded last segment
/// of the URL path. Segments that do not decode to UTF-8 are used as is.
pub fn file_name_for(id: &RecordId, url: &Url) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment)))
        .unwrap_or(Cow::Borrowed(FALLBACK_BASENAME));
    format!("wine_{id}_{basename}")
}

async fn download<C: Client>(
    client: &C,
    url: &Url,
    path: &Path,
) -> Result<usize, DownloadError<C::Error>> {
    let body = client
        .get(url)
        .await
        .map_err(|error| DownloadError::Transport {
            error,
            url: url.clone(),
        })?;
    tokio::fs::write(path, &body)
        .await
        .map_err(|error| DownloadError::Write {
            error,
            path: path.to_owned(),
        })?;
    Ok(body.len())
}

/// Downloads every record's `image` that is not already present on disk.
///
/// Records are handled one at a time. A failing record is logged and counted;
/// it never stops the run.
pub async fn run<C: Client>(
    store: &impl CatalogStore,
    client: &C,
    images_dir: &Path,
) -> Result<FetchReport, Error> {
    let catalog = store.load()?;
    if catalog.is_empty() {
        return Err(Error::EmptyCatalog);
    }
    info!(wines = catalog.wines.len(), dir = ?images_dir, "fetching images");
    tokio::fs::create_dir_all(images_dir)
        .await
        .map_err(|error| Error::CreateDir {
            error,
            path: images_dir.to_owned(),
        })?;

    let mut report = FetchReport::default();
    for (id, record) in catalog.ids() {
        let title = record.title().map(str::to_owned).unwrap_or_else(|| format!("Wine {id}"));
        let Some(src) = record.image() else {
            info!(%id, %title, "no image URL, skipping");
            continue;
        };
        let url = match Url::parse(src) {
            Ok(url) => url,
            Err(error) => {
                let error = DownloadError::<C::Error>::InvalidUrl {
                    error,
                    url: src.to_owned(),
                };
                error!(%id, %title, %error, "download failed");
                report.failed += 1;
                continue;
            }
        };
        let file_name = file_name_for(&id, &url);
        let path = images_dir.join(&file_name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!(%id, %title, file = %file_name, "already exists, skipping");
            report.skipped += 1;
            continue;
        }
        info!(%id, %title, %url, "downloading");
        match download(client, &url, &path).await {
            Ok(bytes) => {
                info!(%id, file = %file_name, bytes, "saved");
                report.downloaded += 1;
            }
            Err(error) => {
                error!(%id, %title, %error, "download failed");
                report.failed += 1;
            }
        }
    }

    if report.failed > 0 {
        warn!(failed = report.failed, "some images could not be downloaded");
    }
    info!(
        downloaded = report.downloaded,
        skipped = report.skipped,
        failed = report.failed,
        dir = ?images_dir,
        "download complete"
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    /// Serves canned bodies; any other URL fails.
    #[derive(Default)]
    pub(crate) struct CannedClient {
        pub bodies: HashMap<String, Vec<u8>>,
        pub requests: std::sync::Mutex<Vec<String>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("404 Not Found")]
    pub(crate) struct NotFound;

    impl Client for CannedClient {
        type Error = NotFound;

        async fn get(&self, url: &Url) -> Result<Bytes, Self::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url.as_str())
                .map(|body| Bytes::from(body.clone()))
                .ok_or(NotFound)
        }
    }

    #[test]
    fn file_name_uses_url_basename() {
        let url = Url::parse("https://cdn.example.com/img/bottle.png?w=200").unwrap();
        assert_eq!(file_name_for(&"17".into(), &url), "wine_17_bottle.png");
    }

    #[test]
    fn file_name_is_percent_decoded() {
        let url = Url::parse("https://cdn.feniks.test/bottles/château margaux.jpg").unwrap();
        assert_eq!(
            file_name_for(&"1".into(), &url),
            "wine_1_château margaux.jpg"
        );
        let url = Url::parse("https://cdn.feniks.test/bottles/ros%C3%A9%20brut.png").unwrap();
        assert_eq!(file_name_for(&"2".into(), &url), "wine_2_rosé brut.png");
    }

    #[test]
    fn file_name_keeps_segments_that_are_not_utf8() {
        let url = Url::parse("https://cdn.feniks.test/bottles/label%FF.jpg").unwrap();
        assert_eq!(file_name_for(&"4".into(), &url), "wine_4_label%FF.jpg");
    }

    #[test]
    fn file_name_falls_back_without_basename() {
        let url = Url::parse("https://cdn.example.com/").unwrap();
        assert_eq!(file_name_for(&"3".into(), &url), "wine_3_image.jpg");
        let url = Url::parse("https://cdn.example.com/photos/").unwrap();
        assert_eq!(file_name_for(&"3".into(), &url), "wine_3_image.jpg");
    }

    #[tokio::test]
    async fn downloads_skips_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("wine_2_old.jpg"), b"cached").unwrap();

        let store = MemoryStore::new(
            serde_json::from_value(json!({
                "wines": [
                    { "form_number": "1", "title": "A", "image": "https://x.test/a.jpg" },
                    { "form_number": "2", "title": "B", "image": "https://x.test/old.jpg" },
                    { "form_number": "3", "title": "C", "image": "https://x.test/gone.jpg" },
                    { "form_number": "4", "title": "D" },
                    { "form_number": "5", "title": "E", "image": "not a url" }
                ]
            }))
            .unwrap(),
        );
        let client = CannedClient {
            bodies: HashMap::from([("https://x.test/a.jpg".to_owned(), b"jpeg".to_vec())]),
            ..Default::default()
        };

        let report = run(&store, &client, &images).await.unwrap();
        assert_eq!(
            report,
            FetchReport {
                downloaded: 1,
                skipped: 1,
                failed: 2
            }
        );
        assert!(!report.is_success());
        assert_eq!(std::fs::read(images.join("wine_1_a.jpg")).unwrap(), b"jpeg");
        assert_eq!(std::fs::read(images.join("wine_2_old.jpg")).unwrap(), b"cached");
        assert!(!images.join("wine_3_gone.jpg").exists());
        assert_eq!(
            *client.requests.lock().unwrap(),
            vec!["https://x.test/a.jpg", "https://x.test/gone.jpg"]
        );
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn empty_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let result = run(&store, &CannedClient::default(), dir.path()).await;
        assert!(matches!(result, Err(Error::EmptyCatalog)));
    }
}
