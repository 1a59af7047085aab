use metrics::counter;
use tracing::{info, instrument};

use crate::api::ParserError;
use crate::prometheus::CHANGES_MAPPED_TOTAL;
use crate::sinks::EventSink;

/// Attribute each change version to `project` in the warehouse.
///
/// Updates run one at a time, in order. There is no transaction around them: if one
/// fails, the updates before it stay applied and the error is returned.
#[instrument(skip_all, fields(project = project, changes = version_ids.len()))]
pub async fn map_changes(
    sink: &(dyn EventSink + Send + Sync),
    version_ids: &[String],
    project: &str,
) -> Result<u64, ParserError> {
    if version_ids.is_empty() || project.trim().is_empty() {
        return Err(ParserError::NoDataToProcess);
    }

    let mut total = 0;
    for version in version_ids {
        let affected = sink.set_change_project(version, project).await?;
        info!(change_id = %version, affected, "mapped change to project");
        total += affected;
    }

    counter!(CHANGES_MAPPED_TOTAL).increment(total);
    info!(
        total,
        "mapped {} changes to project {}",
        version_ids.len(),
        project
    );

    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::event::NormalizedEvent;

    #[derive(Default)]
    struct UpdateRecorder {
        rows_per_change: HashMap<String, u64>,
        fail_on: Option<String>,
        updates: Mutex<Vec<(String, String)>>,
    }

    impl UpdateRecorder {
        fn updates(&self) -> Vec<(String, String)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for UpdateRecorder {
        async fn insert_row(&self, _row: NormalizedEvent) -> Result<(), ParserError> {
            Ok(())
        }

        async fn set_change_project(
            &self,
            change_id: &str,
            project: &str,
        ) -> Result<u64, ParserError> {
            if self.fail_on.as_deref() == Some(change_id) {
                return Err(ParserError::NoDataToProcess);
            }
            self.updates
                .lock()
                .unwrap()
                .push((change_id.to_owned(), project.to_owned()));
            Ok(self.rows_per_change.get(change_id).copied().unwrap_or(0))
        }
    }

    fn versions(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn sums_rows_affected_per_change() {
        let sink = UpdateRecorder {
            rows_per_change: HashMap::from([(String::from("abc"), 1), (String::from("def"), 2)]),
            ..Default::default()
        };

        let total = map_changes(&sink, &versions(&["abc", "def"]), "ShiftLog")
            .await
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(
            sink.updates(),
            vec![
                (String::from("abc"), String::from("ShiftLog")),
                (String::from("def"), String::from("ShiftLog")),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_changes_count_zero() {
        let sink = UpdateRecorder::default();

        let total = map_changes(&sink, &versions(&["abc"]), "ShiftLog")
            .await
            .unwrap();

        assert_eq!(total, 0);
        assert_eq!(sink.updates().len(), 1);
    }

    #[tokio::test]
    async fn empty_versions_issue_no_updates() {
        let sink = UpdateRecorder::default();

        let result = map_changes(&sink, &[], "ShiftLog").await;

        assert!(matches!(result, Err(ParserError::NoDataToProcess)));
        assert!(sink.updates().is_empty());
    }

    #[tokio::test]
    async fn empty_project_issues_no_updates() {
        let sink = UpdateRecorder::default();

        let result = map_changes(&sink, &versions(&["abc"]), "").await;

        assert!(matches!(result, Err(ParserError::NoDataToProcess)));
        assert!(sink.updates().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_earlier_updates() {
        let sink = UpdateRecorder {
            fail_on: Some(String::from("def")),
            ..Default::default()
        };

        let result = map_changes(&sink, &versions(&["abc", "def", "ghi"]), "ShiftLog").await;

        assert!(result.is_err());
        assert_eq!(
            sink.updates(),
            vec![(String::from("abc"), String::from("ShiftLog"))]
        );
    }
}
