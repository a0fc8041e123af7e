// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod object_store;

pub use object_store::{
    HttpObjectStore, HttpStoreConfig, MemoryObjectStore, ObjectStore, ObjectStoreClient,
    StorageError, StoreCallStats,
};
