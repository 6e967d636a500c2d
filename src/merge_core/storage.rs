use std::path::Path;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::OnceCell;

/// Chunk containers the recorder is known to upload.
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "webm", "mkv", "mov", "avi", "ts"];

const PART_SIZE: u64 = 10 * 1024 * 1024;
const MAX_PARTS_IN_FLIGHT: usize = 4;

/// Thin object-store client bound to one region.
///
/// The underlying SDK client is constructed lazily on first use;
/// credentials come from the ambient environment/profile chain.
pub struct ObjectStore {
    region: String,
    client: OnceCell<Client>,
}

impl ObjectStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()))
                    .load()
                    .await;
                Client::new(&config)
            })
            .await
    }

    /// List every video key under the prefix, paging through continuation
    /// tokens until the listing is exhausted. Listing order carries no
    /// guarantee and the caller must sort.
    pub async fn list_video_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let client = self.client().await;
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .with_context(|| format!("failed to list s3://{bucket}/{prefix}"))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    if is_video_key(key) {
                        keys.push(key.to_string());
                    }
                }
            }

            if page.is_truncated() == Some(true) {
                continuation = page.next_continuation_token().map(str::to_string);
                if continuation.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Stream one object to `dest`, creating parent directories. The body is
    /// written part-by-part; the object is never buffered whole.
    pub async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let client = self.client().await;
        let mut object = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to download s3://{bucket}/{key}"))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        while let Some(bytes) = object
            .body
            .try_next()
            .await
            .with_context(|| format!("failed while streaming s3://{bucket}/{key}"))?
        {
            file.write_all(&bytes)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
        }
        file.flush()
            .await
            .with_context(|| format!("failed to flush {}", dest.display()))?;
        Ok(())
    }

    /// Multipart-upload a local file to (bucket, key): 10 MiB parts with at
    /// most four in flight, aborting the upload on any part failure.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<()> {
        let size = tokio::fs::metadata(source)
            .await
            .with_context(|| format!("failed to stat {}", source.display()))?
            .len();
        let client = self.client().await;

        // Multipart uploads require at least one non-empty part.
        if size == 0 {
            client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from_static(b""))
                .send()
                .await
                .with_context(|| format!("failed to upload s3://{bucket}/{key}"))?;
            return Ok(());
        }

        let created = client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("failed to start multipart upload to s3://{bucket}/{key}"))?;
        let upload_id = created
            .upload_id()
            .context("multipart upload returned no upload id")?
            .to_string();

        let uploaded: Result<Vec<CompletedPart>> =
            futures::stream::iter((0..part_count(size)).map(|index| {
                let client = client.clone();
                let upload_id = upload_id.clone();
                let source = source.to_path_buf();
                let (bucket, key) = (bucket.to_string(), key.to_string());
                async move {
                    let offset = index * PART_SIZE;
                    let length = PART_SIZE.min(size - offset);
                    let mut file = tokio::fs::File::open(&source)
                        .await
                        .with_context(|| format!("failed to open {}", source.display()))?;
                    file.seek(std::io::SeekFrom::Start(offset))
                        .await
                        .with_context(|| format!("failed to seek {}", source.display()))?;
                    let mut buffer = vec![0u8; length as usize];
                    file.read_exact(&mut buffer)
                        .await
                        .with_context(|| format!("failed to read {}", source.display()))?;

                    let part_number = (index + 1) as i32;
                    let part = client
                        .upload_part()
                        .bucket(&bucket)
                        .key(&key)
                        .upload_id(&upload_id)
                        .part_number(part_number)
                        .body(ByteStream::from(buffer))
                        .send()
                        .await
                        .with_context(|| {
                            format!("failed to upload part {part_number} to s3://{bucket}/{key}")
                        })?;
                    Ok(CompletedPart::builder()
                        .part_number(part_number)
                        .set_e_tag(part.e_tag().map(str::to_string))
                        .build())
                }
            }))
            .buffered(MAX_PARTS_IN_FLIGHT)
            .try_collect()
            .await;

        match uploaded {
            Ok(parts) => {
                client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .with_context(|| {
                        format!("failed to complete multipart upload to s3://{bucket}/{key}")
                    })?;
                Ok(())
            }
            Err(error) => {
                // Leave no dangling multipart state behind a failed job.
                if let Err(abort_error) = client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        bucket,
                        key,
                        error = %abort_error,
                        "failed to abort multipart upload"
                    );
                }
                Err(error)
            }
        }
    }
}

fn part_count(size: u64) -> u64 {
    size.div_ceil(PART_SIZE)
}

/// Whether a listed key looks like a video chunk we can merge.
pub fn is_video_key(key: &str) -> bool {
    let Some((_, extension)) = key.rsplit_once('.') else {
        return false;
    };
    let extension = extension.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&extension.as_str())
}
