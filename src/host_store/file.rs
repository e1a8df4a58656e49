//! A JSON file-backed implementation of the [`HostStore`][super::HostStore] trait.
//!
//! Wraps an [`InMemoryHostStore`][super::memory::InMemoryHostStore] instance,
//! persisting the host table to a JSON file on disk after each mutation so it
//! can be reloaded across restarts.
use crate::error::Error;
use crate::host_store::memory::InMemoryHostStore;
use crate::host_store::{Host, HostStatus, HostStore};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::IpAddr;
use tokio::fs::File;
use tokio::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A file-backed implementation of a host store. After each update the JSON
/// file on disk is rewritten with the new host table. This file can be
/// reloaded across restarts to avoid losing registrations.
///
/// Wraps an [`InMemoryHostStore`][super::memory::InMemoryHostStore], operating
/// the same way except for maintaining state beyond in-memory.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FileHostStore {
    hosts: InMemoryHostStore,
    path: String,
}

impl FileHostStore {
    /// Save the current host table as JSON to the store's configured path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if a record can't be serialized to JSON.
    ///
    /// Returns [`Error::IO`] if the serialized state can't be written to the
    /// backing file path.
    pub async fn save(&self) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(&self.hosts.snapshot().await)?;
        let mut output_file = File::create(&self.path).await?;
        output_file.write_all(data.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }

    /// Load a [`FileHostStore`] from the JSON host table located at the given
    /// path, creating an empty state file if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the JSON state file is invalid.
    ///
    /// Returns [`Error::IO`] if the path can't be opened or read.
    pub async fn try_from_file(p: &str) -> Result<Self, Error> {
        let contents = match File::open(p).await {
            Ok(mut f) => {
                let mut buf = vec![];
                f.read_to_end(&mut buf).await?;
                buf
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Self::write_empty_state(File::create(&p).await?).await?,
                _ => return Err(Error::IO(err)),
            },
        };

        let hosts: HashMap<String, Host> = serde_json::from_slice(&contents)?;
        Ok(Self {
            hosts: InMemoryHostStore::from_hosts(hosts),
            path: p.to_string(),
        })
    }

    async fn write_empty_state(mut f: File) -> io::Result<Vec<u8>> {
        let default_data = serde_json::to_string_pretty(&HashMap::<String, Host>::new())?;
        let default_bytes = default_data.as_bytes();
        f.write_all(default_bytes).await?;
        f.flush().await?;
        Ok(default_bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl HostStore for FileHostStore {
    async fn create_host(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error> {
        let host = self.hosts.create_host(hostname, ip).await?;
        self.save().await?;
        Ok(host)
    }

    async fn get_by_hostname(&self, hostname: &str) -> Result<Host, Error> {
        self.hosts.get_by_hostname(hostname).await
    }

    async fn update_ip(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error> {
        let host = self.hosts.update_ip(hostname, ip).await?;
        self.save().await?;
        Ok(host)
    }

    async fn touch_last_seen(&self, hostname: &str) -> Result<Host, Error> {
        let host = self.hosts.touch_last_seen(hostname).await?;
        self.save().await?;
        Ok(host)
    }

    async fn mark_offline(&self, hostname: &str) -> Result<Host, Error> {
        let host = self.hosts.mark_offline(hostname).await?;
        self.save().await?;
        Ok(host)
    }

    async fn list_by_status(
        &self,
        status: HostStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Host>, Error> {
        self.hosts.list_by_status(status, limit).await
    }

    async fn delete_host(&self, hostname: &str) -> Result<(), Error> {
        self.hosts.delete_host(hostname).await?;
        self.save().await?;
        Ok(())
    }

    async fn count_by_status(&self, status: HostStatus) -> Result<usize, Error> {
        self.hosts.count_by_status(status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn missing_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let path = path.to_str().unwrap();

        let store = FileHostStore::try_from_file(path).await.unwrap();
        assert_eq!(store.count_by_status(HostStatus::Online).await.unwrap(), 0);
        // The empty state file was created eagerly.
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let path = path.to_str().unwrap();

        {
            let store = FileHostStore::try_from_file(path).await.unwrap();
            store.create_host("host1", ip("203.0.113.5")).await.unwrap();
            store.create_host("host2", ip("2001:db8::1")).await.unwrap();
            store.mark_offline("host2").await.unwrap();
        }

        let reloaded = FileHostStore::try_from_file(path).await.unwrap();
        let host1 = reloaded.get_by_hostname("host1").await.unwrap();
        assert_eq!(host1.current_ip, ip("203.0.113.5"));
        assert_eq!(host1.status, HostStatus::Online);
        let host2 = reloaded.get_by_hostname("host2").await.unwrap();
        assert_eq!(host2.status, HostStatus::Offline);
    }

    #[tokio::test]
    async fn corrupt_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        std::fs::write(&path, "{ not json").unwrap();

        let res = FileHostStore::try_from_file(path.to_str().unwrap()).await;
        assert!(matches!(res, Err(Error::InvalidJSON(_))));
    }
}
