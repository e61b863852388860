// ====================================================================================
// src/persist.rs - 面板消息 ID 的持久化
// ====================================================================================
use crate::error::PersistError;
use crate::models::MessageId;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
struct PanelRecord {
    message_id: MessageId,
}

pub struct MessageIdFile {
    path: PathBuf,
}

impl MessageIdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    // 文件不存在或内容损坏都视为“没有面板”
    pub async fn load(&self) -> Result<Option<MessageId>, PersistError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice::<PanelRecord>(&raw) {
            Ok(record) => Ok(Some(record.message_id)),
            Err(e) => {
                tracing::warn!("面板记录 {} 已损坏，忽略: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, id: Option<MessageId>) -> Result<(), PersistError> {
        let Some(message_id) = id else {
            return match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(e)),
            };
        };

        let body = serde_json::to_vec(&PanelRecord { message_id })?;
        // 先写临时文件再改名，避免写到一半留下半截记录
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = MessageIdFile::new(dir.path().join("panel.json"));

        file.save(Some(MessageId(1424811285542863000))).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(MessageId(1424811285542863000)));
    }

    #[tokio::test]
    async fn missing_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let file = MessageIdFile::new(dir.path().join("panel.json"));
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.json");
        std::fs::write(&path, b"{\"message_id\": \"abc").unwrap();

        let file = MessageIdFile::new(&path);
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_numeric_id_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.json");
        std::fs::write(&path, br#"{"message_id":"panel"}"#).unwrap();

        assert_eq!(MessageIdFile::new(&path).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn saving_absent_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = MessageIdFile::new(dir.path().join("panel.json"));

        file.save(Some(MessageId(7))).await.unwrap();
        file.save(None).await.unwrap();
        assert!(!file.path().exists());
        assert_eq!(file.load().await.unwrap(), None);

        // 再删一次也不报错
        file.save(None).await.unwrap();
    }

    #[tokio::test]
    async fn unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = MessageIdFile::new(dir.path().join("missing-dir").join("panel.json"));
        assert!(matches!(
            file.save(Some(MessageId(7))).await,
            Err(PersistError::Io { .. })
        ));
    }
}
