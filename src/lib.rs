//! # vectorwal
//!
//! The write-ahead log subsystem of a vector database: a fixed-size,
//! double-buffered in-memory log paired with an on-disk segmented log,
//! a single-producer/single-consumer coordination protocol between an
//! appending writer and an applying reader, a stable binary record
//! format, and a recovery procedure that reconstructs reader/writer
//! state from disk given a persisted checkpoint LSN.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        WalManager                          │
//! │   insert_vectors / insert_binary / delete_by_id / flush     │
//! │         │                                     ▲             │
//! │         ▼ append                              │ next        │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                     LogBuffer                        │   │
//! │  │   slab[0]  ◄── writer cursor / reader cursor ──►  slab[1] │
//! │  └───────────────────────┬───────────────────────────────┘   │
//! │                          ▼ encode / decode                  │
//! │                     record (record codec)                    │
//! │                          ▼                                   │
//! │                  <file_no>.wal (SegmentFile)                 │
//! └────────────────────────────────────────────────────────────┘
//!                           ▲
//!                           │ checkpoint LSN
//!                     MetaHandler (FileMetaHandler / caller's catalog)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`manager`] | Public façade — insert/delete/flush, apply-loop `next`, checkpoint coordination |
//! | [`buffer`] | Double-buffered log core — append, next, recovery, reclamation |
//! | [`record`] | Binary record codec — fixed 25-byte header plus variable payload |
//! | [`segment`] | Append-only / read-only access to a single `<file_no>.wal` file |
//! | [`meta`] | Durable storage of the single 64-bit checkpoint LSN |
//!
//! ## Non-goals
//!
//! The vector storage engine, the metadata/catalog database, the request
//! delivery layer, validation, CLI, metrics, and configuration *loading*
//! are external collaborators and are not part of this crate. Multi-writer
//! concurrency, distributed replication, record compression/checksumming,
//! format versioning, and partial-record recovery from a corrupt tail are
//! explicitly out of scope.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vectorwal::manager::{WalManager, WalManagerConfig};
//! use vectorwal::meta::FileMetaHandler;
//!
//! let dir = Path::new("/tmp/my_wal");
//! std::fs::create_dir_all(dir).unwrap();
//!
//! let config = WalManagerConfig {
//!     mxlog_path: dir.to_path_buf(),
//!     buffer_size: 64 * 1024 * 1024,
//!     recovery_error_ignore: false,
//! };
//! let meta = Box::new(FileMetaHandler::new(dir));
//! let manager = WalManager::new(config, meta);
//! manager.init(&[]).unwrap();
//!
//! manager.create_table("embeddings");
//! let lsn = manager
//!     .insert_vectors("embeddings", "default", &[1, 2], &[0.1, 0.2, 0.3, 0.4], 2)
//!     .unwrap();
//!
//! if let Some(record) = manager.next().unwrap() {
//!     assert_eq!(record.lsn, lsn);
//!     manager.apply_done(record.lsn).unwrap();
//! }
//! ```

#![allow(dead_code)]

pub mod buffer;
pub mod manager;
pub mod meta;
pub mod record;
pub mod segment;
