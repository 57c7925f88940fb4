use std::io::Read;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use image::RgbImage;

use super::{decode, ImageSource, SourceError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest image body accepted over HTTP
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build()
    })
}

/// An image addressed by `http://`, `https://` or `file://` URI
pub struct UriSource {
    uri: String,
}

impl UriSource {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
        }
    }

    fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        let http_error = |message: String| SourceError::Http {
            url: self.uri.clone(),
            message,
        };

        let response = agent().get(&self.uri).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => http_error(format!("HTTP {code}")),
            other => http_error(other.to_string()),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|err| http_error(err.to_string()))?;
        if bytes.len() as u64 > MAX_IMAGE_BYTES {
            return Err(http_error(format!("body exceeds {MAX_IMAGE_BYTES} bytes")));
        }
        Ok(bytes)
    }
}

impl ImageSource for UriSource {
    fn url(&self) -> String {
        self.uri.clone()
    }

    fn load(&self) -> Result<RgbImage, SourceError> {
        tracing::info!("Loading image from {}", self.uri);

        let bytes = if let Some(path) = self.uri.strip_prefix("file://") {
            let path = PathBuf::from(path);
            std::fs::read(&path).map_err(|source| SourceError::Io { path, source })?
        } else if self.uri.starts_with("http://") || self.uri.starts_with("https://") {
            self.fetch()?
        } else {
            return Err(SourceError::UnsupportedScheme(self.uri.clone()));
        };

        decode(&bytes, &self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(2, 2, image::Rgb([9, 9, 9]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn serve_once(status: &str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        format!("http://{addr}/image.png")
    }

    #[test]
    fn loads_image_over_http() {
        let url = serve_once("200 OK", png_bytes());

        let image = UriSource::new(&url).load().unwrap();

        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn reports_http_status() {
        let url = serve_once("404 Not Found", Vec::new());

        let err = UriSource::new(&url).load().unwrap_err();

        match err {
            SourceError::Http { message, .. } => assert_eq!(message, "HTTP 404"),
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn loads_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let image = UriSource::new(&format!("file://{}", path.display()))
            .load()
            .unwrap();

        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = UriSource::new("ftp://host/a.png").load().unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedScheme(_)));
    }
}
