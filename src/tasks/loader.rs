use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::Configuration;
use crate::display::{DisplayedImage, Gallery, ImageLoader};
use crate::error::{Error, LoadError};

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Orientation handling is best-effort; if metadata is missing, the original
// orientation is preserved.
fn decode_rgba8_apply_exif(bytes: &[u8]) -> image::ImageResult<image::RgbaImage> {
    let mut img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?
        .to_rgba8();

    match read_orientation(bytes).unwrap_or(1) {
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }

    Ok(img)
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!(orientation = o, "exif orientation");
    Some(o)
}

enum Source {
    Remote(Url),
    File(PathBuf),
}

fn resolve(locator: &str) -> Result<Source, LoadError> {
    match Url::parse(locator) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Source::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Source::File)
            .map_err(|()| LoadError::InvalidLocator {
                locator: locator.to_owned(),
                reason: "not a local file path".into(),
            }),
        // Single-letter schemes are drive letters (`C:\photos\a.jpg`).
        Ok(url) if url.scheme().len() > 1 => Err(LoadError::InvalidLocator {
            locator: locator.to_owned(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        }),
        _ => Ok(Source::File(PathBuf::from(locator))),
    }
}

/// Resolves manifest entries into decoded images and adds them to a [`Gallery`].
#[derive(Debug, Clone)]
pub struct DecodingLoader {
    client: Client,
    gallery: Gallery,
}

impl DecodingLoader {
    pub fn new(gallery: Gallery, timeout: Duration, user_agent: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_owned())
            .build()?;
        Ok(Self { client, gallery })
    }

    pub fn from_config(gallery: Gallery, cfg: &Configuration) -> Result<Self, Error> {
        Self::new(gallery, cfg.load_timeout(), &cfg.user_agent)
    }

    async fn read_bytes(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        match resolve(locator)? {
            Source::Remote(url) => {
                let fetch_err = |err: reqwest::Error| LoadError::Fetch {
                    locator: locator.to_owned(),
                    reason: err.to_string(),
                };
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(fetch_err)?;
                let bytes = response.bytes().await.map_err(fetch_err)?;
                Ok(bytes.to_vec())
            }
            Source::File(path) => tokio::fs::read(&path).await.map_err(|source| LoadError::Io {
                locator: locator.to_owned(),
                source,
            }),
        }
    }
}

#[async_trait]
impl ImageLoader for DecodingLoader {
    async fn open(&self, locator: &str) -> Result<(), LoadError> {
        if locator.trim().is_empty() {
            return Err(LoadError::EmptyLocator);
        }
        let bytes = self.read_bytes(locator).await?;
        let img = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&bytes))
            .await
            .map_err(|err| LoadError::Worker {
                locator: locator.to_owned(),
                reason: err.to_string(),
            })?
            .map_err(|source| LoadError::Decode {
                locator: locator.to_owned(),
                source,
            })?;

        let (width, height) = img.dimensions();
        debug!(locator, width, height, "decoded image");
        self.gallery.show(DisplayedImage {
            locator: locator.to_owned(),
            width,
            height,
        });
        Ok(())
    }
}
