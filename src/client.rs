//! HTTP adapter for a node exposing the `files/*` RPC API and a path gateway.

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{multipart, Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::path;
use crate::service::{FileService, ProgressSink, TransferHandle, TransferOutcome};
use crate::types::{
    DirectoryEntry, DirectoryListing, DownloadDescriptor, EntryKind, UploadEntry, UploadSource,
};

// --- WIRE TYPES ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct StatResponse {
    hash: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    cumulative_size: u64,
    #[serde(rename = "Type")]
    kind: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct LsEntry {
    name: String,
    #[serde(rename = "Type", default)]
    kind: u8,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    #[serde(default)]
    entries: Option<Vec<LsEntry>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct HashResponse {
    hash: String,
}

const LS_TYPE_DIRECTORY: u8 = 1;

/// Byte counter shared by the concurrent writes of one batch.
#[derive(Clone)]
struct WriteProgress {
    sink: ProgressSink,
    written: Arc<AtomicU64>,
    total: u64,
}

impl WriteProgress {
    fn new(sink: ProgressSink, total: u64) -> Self {
        Self {
            sink,
            written: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    fn advance(&self, bytes: u64) {
        let written = self.written.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.sink.report(match self.total {
            0 => 100,
            total => (written * 100 / total).min(100),
        });
    }
}

/// Link names for a wrapped selection. Entries from different folders that
/// share a name would overwrite each other in the wrapper, so they are refused.
fn link_names(selection: &[DirectoryEntry]) -> ServiceResult<Vec<&str>> {
    let mut seen = HashSet::new();
    selection
        .iter()
        .map(|entry| {
            let name = entry.name();
            if seen.insert(name) {
                Ok(name)
            } else {
                Err(ServiceError::InvalidPath(format!(
                    "Duplicate name in selection: {name} ({})",
                    entry.path
                )))
            }
        })
        .collect()
}

// --- THE CLIENT ---

#[derive(Clone)]
pub struct NodeClient {
    client: Client,
    api_url: String,
    gateway_url: String,
    share_gateway_url: String,
    download_dir: PathBuf,
    request_timeout: Duration,
    pub workers: usize,
}

impl NodeClient {
    pub fn new(config: &NodeConfig, workers: usize) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(workers)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .connect_timeout(config.request_timeout())
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            share_gateway_url: config.share_gateway_url.trim_end_matches('/').to_string(),
            download_dir: config.download_dir.clone(),
            request_timeout: config.request_timeout(),
            workers: workers.max(1),
        }
    }

    pub fn set_download_dir(&mut self, dir: impl Into<PathBuf>) {
        self.download_dir = dir.into();
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/api/v0/{}", self.api_url, method)
    }

    async fn ensure_success(response: Response) -> ServiceResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
        if message.contains("does not exist") || message.contains("not found") {
            Err(ServiceError::NotFound(message))
        } else {
            Err(ServiceError::Api(message))
        }
    }

    async fn send(&self, method: &str, args: &[(&str, &str)]) -> ServiceResult<Response> {
        debug!("RPC {method} {args:?}");
        let response = self
            .client
            .post(self.api_url(method))
            .query(args)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, args: &[(&str, &str)]) -> ServiceResult<T> {
        let response = self.send(method, args).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    // --- Core Operations ---

    /// Describes a single remote path.
    pub async fn stat_entry(&self, remote_path: &str) -> ServiceResult<DirectoryEntry> {
        if !remote_path.starts_with('/') {
            return Err(ServiceError::InvalidPath(remote_path.to_string()));
        }
        let stat: StatResponse = self.call("files/stat", &[("arg", remote_path)]).await?;
        let kind = if stat.kind == "directory" {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let size = if kind == EntryKind::Directory {
            stat.cumulative_size
        } else {
            stat.size
        };
        Ok(DirectoryEntry {
            path: remote_path.to_string(),
            kind,
            size: Some(size),
            hash: Some(stat.hash),
        })
    }

    async fn list_entries(&self, remote_path: &str) -> ServiceResult<Vec<DirectoryEntry>> {
        let ls: LsResponse = self
            .call("files/ls", &[("arg", remote_path), ("long", "true")])
            .await?;
        let entries = ls
            .entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| DirectoryEntry {
                path: path::resolve(remote_path, &e.name),
                kind: if e.kind == LS_TYPE_DIRECTORY {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
                size: Some(e.size),
                hash: e.hash,
            })
            .collect::<Vec<_>>();
        debug!("Listed {} entries in {remote_path}", entries.len());
        Ok(entries)
    }

    async fn hash_of(&self, entry: &DirectoryEntry) -> ServiceResult<String> {
        match &entry.hash {
            Some(hash) => Ok(hash.clone()),
            None => self
                .stat_entry(&entry.path)
                .await?
                .hash
                .ok_or_else(|| ServiceError::Api(format!("No hash for {}", entry.path))),
        }
    }

    /// Content hash of a directory linking every selected entry by name.
    async fn wrap_selection(&self, selection: &[DirectoryEntry]) -> ServiceResult<String> {
        let names = link_names(selection)?;
        let mut root = self
            .call::<HashResponse>("object/new", &[("arg", "unixfs-dir")])
            .await?
            .hash;
        for (entry, name) in selection.iter().zip(names) {
            let hash = self.hash_of(entry).await?;
            let linked: HashResponse = self
                .call(
                    "object/patch/add-link",
                    &[("arg", root.as_str()), ("arg", name), ("arg", hash.as_str())],
                )
                .await?;
            root = linked.hash;
        }
        Ok(root)
    }

    /// Gateway URL for `hash` with properly encoded query parameters.
    fn gateway_link(&self, hash: &str, query: &[(&str, &str)]) -> ServiceResult<String> {
        let mut url = Url::parse(&format!("{}/ipfs/{hash}", self.gateway_url))
            .map_err(|e| ServiceError::Api(format!("Invalid gateway URL: {e}")))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.into())
    }

    async fn write_one(&self, entry: UploadEntry, progress: WriteProgress) -> ServiceResult<()> {
        let filename = path::basename(&entry.path).to_string();
        let part = match entry.source {
            UploadSource::Bytes(data) => {
                let len = data.len() as u64;
                progress.advance(len);
                multipart::Part::bytes(data).file_name(filename)
            }
            UploadSource::Local(local) => {
                if !local.exists() {
                    return Err(ServiceError::NotFound(local.display().to_string()));
                }
                // Stream the file instead of loading it into memory
                let file = tokio::fs::File::open(&local).await?;
                let file_size = file.metadata().await?.len();
                let stream = tokio_util::io::ReaderStream::new(file)
                    .inspect_ok(move |chunk| progress.advance(chunk.len() as u64));
                let body = reqwest::Body::wrap_stream(stream);
                multipart::Part::stream_with_length(body, file_size).file_name(filename)
            }
        };
        let part = part
            .mime_str("application/octet-stream")
            .map_err(|e| ServiceError::Api(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.api_url("files/write"))
            .query(&[
                ("arg", entry.path.as_str()),
                ("create", "true"),
                ("parents", "true"),
                ("truncate", "true"),
            ])
            .multipart(form)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

// --- SERVICE CONTRACT ---

impl FileService for NodeClient {
    async fn fetch_directory(&self, remote_path: &str) -> ServiceResult<DirectoryListing> {
        let stat = self.stat_entry(remote_path).await?;
        let entries = if stat.is_dir() {
            self.list_entries(remote_path).await?
        } else {
            Vec::new()
        };
        Ok(DirectoryListing {
            path: stat.path,
            kind: stat.kind,
            hash: stat.hash,
            entries,
        })
    }

    async fn write(&self, base_path: &str, entries: Vec<UploadEntry>, sink: ProgressSink) -> ServiceResult<()> {
        let total = entries.len();
        let mut total_bytes = 0;
        for entry in &entries {
            total_bytes += match &entry.source {
                UploadSource::Bytes(data) => data.len() as u64,
                UploadSource::Local(local) => tokio::fs::metadata(local).await.map_or(0, |m| m.len()),
            };
        }
        let progress = WriteProgress::new(sink, total_bytes);
        progress.sink.report(0);

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| {
                let client = self.clone();
                let progress = progress.clone();
                async move {
                    let target = entry.path.clone();
                    (target, client.write_one(entry, progress).await)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut first_error = None;
        let mut failed = 0;
        for (target, result) in results {
            if let Err(e) = result {
                warn!("Failed to write {target}: {e}");
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => {
                warn!("{failed} of {total} writes under {base_path} failed");
                Err(e)
            }
            None => {
                info!("Wrote {total} entries under {base_path}");
                Ok(())
            }
        }
    }

    async fn add_by_path(&self, base_path: &str, source: &str) -> ServiceResult<()> {
        let name = path::basename(source);
        if name.is_empty() {
            return Err(ServiceError::InvalidPath(source.to_string()));
        }
        let target = path::resolve(base_path, name);
        self.send("files/cp", &[("arg", source), ("arg", target.as_str())])
            .await?;
        Ok(())
    }

    async fn make_directory(&self, remote_path: &str) -> ServiceResult<()> {
        self.send("files/mkdir", &[("arg", remote_path), ("parents", "true")])
            .await?;
        Ok(())
    }

    async fn move_entry(&self, from: &str, to: &str) -> ServiceResult<()> {
        self.send("files/mv", &[("arg", from), ("arg", to)]).await?;
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> ServiceResult<()> {
        let mut args: Vec<(&str, &str)> = paths.iter().map(|p| ("arg", p.as_str())).collect();
        args.push(("recursive", "true"));
        self.send("files/rm", &args).await?;
        Ok(())
    }

    async fn request_download_link(&self, selection: &[DirectoryEntry]) -> ServiceResult<DownloadDescriptor> {
        match selection {
            [] => Err(ServiceError::InvalidPath("empty selection".to_string())),
            [entry] if !entry.is_dir() => {
                let hash = self.hash_of(entry).await?;
                let filename = entry.name().to_string();
                Ok(DownloadDescriptor {
                    url: self.gateway_link(&hash, &[("filename", filename.as_str()), ("download", "true")])?,
                    filename,
                })
            }
            [entry] => {
                let hash = self.hash_of(entry).await?;
                Ok(DownloadDescriptor {
                    url: self.gateway_link(&hash, &[("format", "tar")])?,
                    filename: format!("{}.tar", entry.name()),
                })
            }
            many => {
                let hash = self.wrap_selection(many).await?;
                Ok(DownloadDescriptor {
                    url: self.gateway_link(&hash, &[("format", "tar")])?,
                    filename: format!("download_{hash}.tar"),
                })
            }
        }
    }

    async fn request_share_link(&self, selection: &[DirectoryEntry]) -> ServiceResult<String> {
        let hash = match selection {
            [] => return Err(ServiceError::InvalidPath("empty selection".to_string())),
            [entry] => self.hash_of(entry).await?,
            many => self.wrap_selection(many).await?,
        };
        Ok(format!("{}/ipfs/{hash}", self.share_gateway_url))
    }

    async fn begin_transfer(&self, descriptor: &DownloadDescriptor, sink: ProgressSink) -> ServiceResult<TransferHandle> {
        let response = self.client.get(&descriptor.url).send().await?;
        let response = Self::ensure_success(response).await?;
        let total = response.content_length();

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let local_path = self.download_dir.join(&descriptor.filename);
        let mut file = tokio::fs::File::create(&local_path).await?;

        let handle = sink.handle();
        sink.report(0);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = sink.cancelled() => TransferOutcome::Cancelled,
                result = copy_body(response, &mut file, total, &sink) => match result {
                    Ok(()) => TransferOutcome::Completed,
                    Err(e) => TransferOutcome::Failed(e.to_string()),
                },
            };
            drop(file);

            if outcome != TransferOutcome::Completed {
                let _ = tokio::fs::remove_file(&local_path).await;
            }
            sink.finish(outcome);
        });
        Ok(handle)
    }
}

/// Streams the body into `file`, reporting a percentage when the length is
/// known and the received byte count otherwise.
async fn copy_body(
    response: Response,
    file: &mut tokio::fs::File,
    total: Option<u64>,
    sink: &ProgressSink,
) -> ServiceResult<()> {
    let mut stream = response.bytes_stream();
    let mut received = 0u64;
    while let Some(chunk) = stream.next().await {
        let data = chunk?;
        file.write_all(&data).await?;
        received += data.len() as u64;
        sink.report(match total {
            Some(total) if total > 0 => received * 100 / total,
            _ => received,
        });
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NodeClient {
        NodeClient::new(&NodeConfig::default(), 1)
    }

    #[tokio::test]
    async fn download_link_encodes_filename() {
        let entry = DirectoryEntry::file("/docs/Q&A #2.txt").with_hash("bafyx");
        let descriptor = client().request_download_link(&[entry]).await.unwrap();
        assert_eq!(descriptor.filename, "Q&A #2.txt");

        let url = Url::parse(&descriptor.url).unwrap();
        assert_eq!(url.path(), "/ipfs/bafyx");
        assert_eq!(url.fragment(), None);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("filename".to_string(), "Q&A #2.txt".to_string()),
                ("download".to_string(), "true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn folder_download_is_a_tar() {
        let entry = DirectoryEntry::directory("/photos").with_hash("bafydir");
        let descriptor = client().request_download_link(&[entry]).await.unwrap();
        assert_eq!(descriptor.url, "http://127.0.0.1:8080/ipfs/bafydir?format=tar");
        assert_eq!(descriptor.filename, "photos.tar");
    }

    #[tokio::test]
    async fn same_name_from_two_folders_is_refused() {
        let selection = [
            DirectoryEntry::file("/a/x.txt").with_hash("bafya"),
            DirectoryEntry::file("/b/x.txt").with_hash("bafyb"),
        ];
        // Refused before any request, so no node is needed.
        let result = client().request_download_link(&selection).await;
        assert!(matches!(result, Err(ServiceError::InvalidPath(msg)) if msg.contains("/b/x.txt")));

        let result = client().request_share_link(&selection).await;
        assert!(matches!(result, Err(ServiceError::InvalidPath(_))));
    }

    #[test]
    fn distinct_names_keep_selection_order() {
        let selection = [DirectoryEntry::file("/a/x.txt"), DirectoryEntry::directory("/b/y")];
        assert_eq!(link_names(&selection).unwrap(), ["x.txt", "y"]);
    }

    #[test]
    fn write_progress_is_a_capped_percentage() {
        let sink = ProgressSink::new();
        let progress = WriteProgress::new(sink.clone(), 200);
        progress.advance(50);
        assert_eq!(sink.progress(), 25);
        progress.clone().advance(150);
        assert_eq!(sink.progress(), 100);
        progress.advance(10);
        assert_eq!(sink.progress(), 100);
    }
}
