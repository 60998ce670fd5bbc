#![forbid(unsafe_code)]

//! Fixtures shared by the unit tests of several modules.

use std::{
    collections::HashMap,
    fs,
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use crate::extractor::{ExtractError, FlatEntry, ListingPayload, MediaExtractor};

/// Writes an executable script named `name` into `dir`.
pub fn install_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }
    path
}

/// Canned answer for [`serve`].
pub struct ServedResponse {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send the body in chunks of this size with a pause before each one.
    pub chunk: Option<(usize, Duration)>,
}

impl ServedResponse {
    pub fn new(status: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/octet-stream",
            body,
            chunk: None,
        }
    }
}

/// Answers exactly one HTTP request with `status` and `body` on a loopback
/// port and returns the URL to request.
pub fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    serve(ServedResponse::new(status, body))
}

pub fn serve(response: ServedResponse) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).map(|read| read > 0).unwrap_or(false) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        let mut stream = reader.into_inner();
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
            response.status,
            response.body.len(),
            response.content_type
        );
        let _ = stream.write_all(head.as_bytes());
        match response.chunk {
            Some((size, pause)) => {
                for piece in response.body.chunks(size.max(1)) {
                    thread::sleep(pause);
                    if stream.write_all(piece).and_then(|_| stream.flush()).is_err() {
                        return;
                    }
                }
            }
            None => {
                let _ = stream.write_all(&response.body);
            }
        }
        let _ = stream.flush();
    });
    format!("http://{addr}/media")
}

pub fn entry(id: &str) -> FlatEntry {
    FlatEntry {
        id: Some(id.to_string()),
        title: Some(format!("Title {id}")),
        url: Some(format!("https://www.youtube.com/watch?v={id}")),
        ..FlatEntry::default()
    }
}

/// In-memory [`MediaExtractor`] keyed by listing URL.
#[derive(Default)]
pub struct FakeExtractor {
    pub listings: HashMap<String, Vec<Option<FlatEntry>>>,
    pub failing_urls: Vec<String>,
    pub title: Option<String>,
    pub fail_title: bool,
    pub media_url: Option<String>,
    pub list_calls: Mutex<Vec<(String, Option<usize>)>>,
    pub probe_calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn with_listing(mut self, url: &str, entries: Vec<Option<FlatEntry>>) -> Self {
        self.listings.insert(url.to_string(), entries);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

impl MediaExtractor for FakeExtractor {
    fn list_flat(
        &self,
        url: &str,
        playlist_end: Option<usize>,
    ) -> Result<ListingPayload, ExtractError> {
        self.list_calls.lock().push((url.to_string(), playlist_end));
        if self.failing_urls.iter().any(|failing| failing == url) {
            return Err(ExtractError::Exit {
                program: "fake".into(),
                status: "exit status: 1".into(),
                stderr: "ERROR: blocked".into(),
            });
        }
        let entries = self.listings.get(url).cloned().unwrap_or_default();
        Ok(ListingPayload {
            entries: Some(entries),
            own: FlatEntry::default(),
        })
    }

    fn probe_title(&self, _url: &str) -> Result<Option<String>, ExtractError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_title {
            return Err(ExtractError::Empty("title"));
        }
        Ok(self.title.clone())
    }

    fn download(&self, _url: &str, _output_template: &str) -> Result<(), ExtractError> {
        Err(ExtractError::Empty("download support"))
    }

    fn resolve_media_url(&self, _url: &str) -> Result<String, ExtractError> {
        self.media_url.clone().ok_or(ExtractError::Empty("media url"))
    }
}
