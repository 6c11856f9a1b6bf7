//! Best-effort audit trail of executed searches.

use crate::{
    config::ROW_LIMIT_CEILING,
    error::{Result, ServiceError},
    models::{SavedSearchRecord, SavedSearchRow},
    pagination::{decode_cursor, PaginationMeta},
    store::SearchLog,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Serialize)]
pub struct SavedSearchPage {
    pub results: Vec<SavedSearchRow>,
    pub pagination: PaginationMeta,
}

#[derive(Clone)]
pub struct SearchRecorder {
    log: Arc<dyn SearchLog>,
}

impl SearchRecorder {
    pub fn new(log: Arc<dyn SearchLog>) -> Self {
        Self { log }
    }

    /// Appends the record. Failures are logged and never reach the caller.
    pub async fn record(&self, record: SavedSearchRecord) {
        let kind = record.query_kind.as_str();
        match self.log.append(record).await {
            Ok(()) => debug!(query_kind = kind, "saved search recorded"),
            Err(err) => warn!(error = %err, query_kind = kind, "failed to record saved search"),
        }
    }

    pub async fn history(
        &self,
        caller_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> Result<SavedSearchPage> {
        let caller_id = caller_id.trim();
        if caller_id.is_empty() {
            return Err(ServiceError::InvalidRequest("userId is required".into()));
        }

        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, ROW_LIMIT_CEILING);
        let offset = cursor.map(decode_cursor).transpose()?.unwrap_or(0);

        let results = self.log.list(caller_id, offset, limit).await?;
        let pagination = PaginationMeta::for_page(offset, limit, results.len());
        Ok(SavedSearchPage {
            results,
            pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryKind;
    use crate::pagination::encode_cursor;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryLog {
        appended: Mutex<Vec<SavedSearchRecord>>,
        listed: Mutex<Vec<(String, i64, i64)>>,
        fail: bool,
    }

    #[async_trait]
    impl SearchLog for MemoryLog {
        async fn append(&self, record: SavedSearchRecord) -> Result<()> {
            if self.fail {
                return Err(ServiceError::Internal(anyhow::anyhow!("relation does not exist")));
            }
            self.appended.lock().unwrap().push(record);
            Ok(())
        }

        async fn list(&self, caller_id: &str, offset: i64, limit: i64) -> Result<Vec<SavedSearchRow>> {
            self.listed
                .lock()
                .unwrap()
                .push((caller_id.to_string(), offset, limit));
            Ok(Vec::new())
        }
    }

    fn record() -> SavedSearchRecord {
        SavedSearchRecord {
            caller_id: Some("user-7".into()),
            display_name: "vacant lots".into(),
            query_kind: QueryKind::NaturalLanguage,
            raw_text: Some("vacant lots".into()),
            generated_sql: Some("SELECT 1 LIMIT 100".into()),
            parameters: None,
            result_count: 0,
        }
    }

    #[tokio::test]
    async fn records_successfully() {
        let log = Arc::new(MemoryLog::default());
        SearchRecorder::new(log.clone()).record(record()).await;
        assert_eq!(log.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn swallows_append_failures() {
        let log = Arc::new(MemoryLog {
            fail: true,
            ..MemoryLog::default()
        });
        SearchRecorder::new(log.clone()).record(record()).await;
        assert!(log.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_decodes_cursor_and_bounds_limit() {
        let log = Arc::new(MemoryLog::default());
        let recorder = SearchRecorder::new(log.clone());

        let cursor = encode_cursor(40);
        recorder
            .history("user-7", Some(&cursor), Some(5000))
            .await
            .unwrap();
        recorder.history("user-7", None, None).await.unwrap();

        assert_eq!(
            *log.listed.lock().unwrap(),
            vec![("user-7".to_string(), 40, 100), ("user-7".to_string(), 0, 20)]
        );
    }

    #[tokio::test]
    async fn history_requires_caller() {
        let recorder = SearchRecorder::new(Arc::new(MemoryLog::default()));
        let err = recorder.history(" ", None, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
