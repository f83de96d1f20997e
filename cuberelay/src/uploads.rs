//! Intake of the six face images.
//!
//! Parts are read as they stream in. Each face is either buffered in memory or, when
//! `uploads.spill_to_disk` is set, written to a file inside a temporary directory owned by the
//! resulting [`FaceSet`]. Dropping the set removes that directory, so spilled bytes live exactly
//! as long as the request that produced them.
//!
//! ```text
//! multipart field ──► FaceCollector::ingest ──► (duplicate? too large? empty?)
//!                                         │
//!                 all parts read ──► FaceCollector::finish
//!                                         ├─ missing faces?       → MissingFaces
//!                                         ├─ resolve type (U..B)  → InvalidFaceType
//!                                         └─ FaceSet
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::config::UploadConfig;
use crate::errors::{Error, Result};
use crate::image_type::{self, ImageKind, SNIFF_LEN, TypeSource};
use crate::types::Face;

/// Where a face's bytes currently live.
#[derive(Debug)]
pub enum FacePayload {
    Memory(Bytes),
    Spooled(PathBuf),
}

/// A validated face image, ready to be forwarded.
#[derive(Debug)]
pub struct FaceUpload {
    pub face: Face,
    /// Original filename, or `<face>_face.<ext>` when the client sent none
    pub file_name: String,
    pub content_type: ImageKind,
    /// How `content_type` was determined
    pub type_source: TypeSource,
    pub len: u64,
    pub payload: FacePayload,
}

impl FaceUpload {
    /// Read the whole payload back, wherever it is stored.
    pub async fn bytes(&self) -> std::io::Result<Bytes> {
        match &self.payload {
            FacePayload::Memory(bytes) => Ok(bytes.clone()),
            FacePayload::Spooled(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }

    /// Build the outbound multipart part, streaming from disk for spooled faces.
    async fn to_part(&self) -> anyhow::Result<Part> {
        let body = match &self.payload {
            FacePayload::Memory(bytes) => reqwest::Body::from(bytes.clone()),
            FacePayload::Spooled(path) => {
                let file = tokio::fs::File::open(path).await?;
                reqwest::Body::wrap_stream(ReaderStream::new(file))
            }
        };

        let part = Part::stream_with_length(body, self.len)
            .file_name(self.file_name.clone())
            .mime_str(self.content_type.mime_type())?;
        Ok(part)
    }
}

/// Exactly six validated faces, one per face code.
#[derive(Debug)]
pub struct FaceSet {
    faces: BTreeMap<Face, FaceUpload>,
    // Held for its Drop: removes spooled files
    spool: Option<TempDir>,
}

impl FaceSet {
    /// Read a multipart request into a validated set of faces.
    ///
    /// Fields whose names are not face codes are skipped.
    #[instrument(skip_all)]
    pub async fn from_multipart(multipart: &mut Multipart, config: &UploadConfig) -> Result<Self> {
        let mut collector = FaceCollector::new(config);

        while let Some(field) = multipart.next_field().await.map_err(|e| Error::MalformedUpload {
            message: format!("Failed to parse multipart data: {}", e),
        })? {
            let field_name = field.name().unwrap_or("").to_string();
            let Ok(face) = field_name.parse::<Face>() else {
                debug!(field = %field_name, "Ignoring non-face multipart field");
                continue;
            };

            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            collector.ingest(face, file_name, content_type, field).await?;
        }

        collector.finish()
    }

    pub fn get(&self, face: Face) -> Option<&FaceUpload> {
        self.faces.get(&face)
    }

    /// Faces in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &FaceUpload> {
        self.faces.values()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.faces.values().map(|f| f.len).sum()
    }

    /// Temporary directory holding spooled faces, if any.
    pub fn spool_dir(&self) -> Option<&Path> {
        self.spool.as_ref().map(TempDir::path)
    }

    /// Re-encode the faces as a new multipart body under the same face keys.
    pub async fn multipart_form(&self) -> anyhow::Result<Form> {
        let mut form = Form::new();
        for upload in self.faces.values() {
            form = form.part(upload.face.code(), upload.to_part().await?);
        }
        Ok(form)
    }
}

/// A face part as received, before type resolution.
#[derive(Debug)]
struct ReceivedFace {
    file_name: Option<String>,
    declared_type: Option<String>,
    head: Vec<u8>,
    len: u64,
    payload: FacePayload,
}

/// Accumulates face parts for one request.
pub struct FaceCollector<'a> {
    config: &'a UploadConfig,
    received: BTreeMap<Face, ReceivedFace>,
    spool: Option<TempDir>,
}

impl<'a> FaceCollector<'a> {
    pub fn new(config: &'a UploadConfig) -> Self {
        Self {
            config,
            received: BTreeMap::new(),
            spool: None,
        }
    }

    /// Read one face part to completion, enforcing the duplicate, size and empty checks.
    pub async fn ingest<S, E>(&mut self, face: Face, file_name: Option<String>, declared_type: Option<String>, chunks: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        if self.received.contains_key(&face) {
            return Err(Error::DuplicateFace { face });
        }

        let max_file_size = self.config.max_file_size;
        let mut chunks = std::pin::pin!(chunks);
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut len = 0u64;
        let mut sink = self.sink_for(face).await?;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| Error::MalformedUpload {
                message: format!("Failed to read file for face {}: {}", face, e),
            })?;

            len += chunk.len() as u64;
            if len > max_file_size {
                debug!(face = %face, len, max_file_size, "Face exceeds size limit, aborting upload");
                return Err(Error::FaceTooLarge {
                    face,
                    limit: max_file_size,
                });
            }

            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }

            sink.write(&chunk).await?;
        }

        if len == 0 {
            return Err(Error::EmptyFace { face });
        }

        debug!(face = %face, len, file_name = ?file_name, declared_type = ?declared_type, "Received face");

        self.received.insert(
            face,
            ReceivedFace {
                file_name,
                declared_type,
                head,
                len,
                payload: sink.finish().await?,
            },
        );
        Ok(())
    }

    /// Check that all six faces are present and resolve each face's image type.
    pub fn finish(mut self) -> Result<FaceSet> {
        let missing: Vec<Face> = Face::ALL.into_iter().filter(|f| !self.received.contains_key(f)).collect();
        if !missing.is_empty() {
            return Err(Error::MissingFaces { missing });
        }

        let mut faces = BTreeMap::new();
        for face in Face::ALL {
            let Some(received) = self.received.remove(&face) else {
                return Err(Error::MissingFaces { missing: vec![face] });
            };

            let (content_type, type_source) =
                image_type::resolve(received.declared_type.as_deref(), received.file_name.as_deref(), &received.head)
                    .map_err(|unresolved| Error::InvalidFaceType {
                        face,
                        got: unresolved.got,
                    })?;

            if type_source != TypeSource::Declared {
                debug!(face = %face, content_type = %content_type, source = ?type_source, "Resolved face type without a declared MIME type");
            }

            let file_name = received
                .file_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("{}_face.{}", face, content_type.extension()));

            faces.insert(
                face,
                FaceUpload {
                    face,
                    file_name,
                    content_type,
                    type_source,
                    len: received.len,
                    payload: received.payload,
                },
            );
        }

        Ok(FaceSet { faces, spool: self.spool })
    }

    async fn sink_for(&mut self, face: Face) -> Result<FaceSink> {
        if !self.config.spill_to_disk {
            return Ok(FaceSink::Memory(BytesMut::new()));
        }

        if self.spool.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("cuberelay-");
            let dir = match &self.config.temp_dir {
                Some(parent) => builder.tempdir_in(parent),
                None => builder.tempdir(),
            }
            .map_err(|e| anyhow::anyhow!("Failed to create temporary upload directory: {}", e))?;
            debug!(path = %dir.path().display(), "Created temporary upload directory");
            self.spool = Some(dir);
        }

        let dir = self.spool.as_ref().map(TempDir::path).ok_or_else(|| Error::Internal {
            operation: "locate temporary upload directory".to_string(),
        })?;
        let path = dir.join(format!("{}.part", face));
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create spool file for face {}: {}", face, e))?;
        Ok(FaceSink::File { file, path })
    }
}

/// Destination of a face's bytes while streaming.
enum FaceSink {
    Memory(BytesMut),
    File { file: tokio::fs::File, path: PathBuf },
}

impl FaceSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            FaceSink::Memory(buf) => buf.extend_from_slice(chunk),
            FaceSink::File { file, path } => file
                .write_all(chunk)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to write spool file {}: {}", path.display(), e))?,
        }
        Ok(())
    }

    async fn finish(self) -> Result<FacePayload> {
        match self {
            FaceSink::Memory(buf) => Ok(FacePayload::Memory(buf.freeze())),
            FaceSink::File { mut file, path } => {
                file.flush()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to flush spool file {}: {}", path.display(), e))?;
                Ok(FacePayload::Spooled(path))
            }
        }
    }
}
