use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use oauth2_core::OAuth2Error;
use oauth2_ports::{DynRecordStore, ModelClass, RecordStore};

use crate::Metrics;

/// A thin wrapper around a `DynRecordStore` that creates a tracing span for each
/// call and, when configured, records Prometheus metrics.
pub struct ObservedRecordStore {
    inner: DynRecordStore,
    db_system: String,
    metrics: Option<Arc<Metrics>>,
}

impl ObservedRecordStore {
    pub fn new(inner: DynRecordStore, db_system: String) -> Self {
        Self {
            inner,
            db_system,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn db_system(&self) -> &str {
        &self.db_system
    }

    /// Key values are often user identifiers; only a prefix goes into spans.
    fn key_prefix(key_value: &str) -> String {
        key_value.chars().take(12).collect::<String>()
    }

    async fn observe<T, Fut>(
        &self,
        operation: &'static str,
        span: tracing::Span,
        fut: Fut,
    ) -> Result<T, OAuth2Error>
    where
        Fut: Future<Output = Result<T, OAuth2Error>>,
    {
        let started = Instant::now();
        let result = fut.instrument(span.clone()).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_storage_operation(operation, result.is_ok(), started.elapsed());
        }
        if let Err(err) = &result {
            span.in_scope(|| tracing::warn!(error = %err, "record store operation failed"));
        }

        result
    }
}

#[async_trait]
impl RecordStore for ObservedRecordStore {
    async fn init_model(&self, model: &ModelClass) -> Result<(), OAuth2Error> {
        let span = tracing::info_span!(
            "db",
            db_system = %self.db_system,
            db_operation = "init_model",
            table = %model.table
        );
        self.observe("init_model", span, self.inner.init_model(model))
            .await
    }

    async fn filter(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
    ) -> Result<Vec<Option<String>>, OAuth2Error> {
        let key_prefix = Self::key_prefix(key_value);
        let span = tracing::info_span!(
            "db",
            db_system = %self.db_system,
            db_operation = "filter",
            table = %model.table,
            key_name = %key_name,
            key_prefix = %key_prefix,
            property = %property_name,
            rows = tracing::field::Empty
        );

        let rows = self
            .observe(
                "filter",
                span.clone(),
                self.inner
                    .filter(model, key_name, key_value, property_name),
            )
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    async fn save(
        &self,
        model: &ModelClass,
        key_name: &str,
        key_value: &str,
        property_name: &str,
        value: Option<String>,
    ) -> Result<(), OAuth2Error> {
        // Never log the value itself; it holds tokens.
        let key_prefix = Self::key_prefix(key_value);
        let span = tracing::info_span!(
            "db",
            db_system = %self.db_system,
            db_operation = "save",
            table = %model.table,
            key_name = %key_name,
            key_prefix = %key_prefix,
            property = %property_name,
            value_len = value.as_ref().map_or(0, String::len)
        );
        self.observe(
            "save",
            span,
            self.inner
                .save(model, key_name, key_value, property_name, value),
        )
        .await
    }

    async fn healthcheck(&self) -> Result<(), OAuth2Error> {
        let span = tracing::info_span!(
            "db",
            db_system = %self.db_system,
            db_operation = "healthcheck"
        );
        self.observe("healthcheck", span, self.inner.healthcheck())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn init_model(&self, _model: &ModelClass) -> Result<(), OAuth2Error> {
            Ok(())
        }

        async fn filter(
            &self,
            _model: &ModelClass,
            _key_name: &str,
            _key_value: &str,
            _property_name: &str,
        ) -> Result<Vec<Option<String>>, OAuth2Error> {
            Ok(vec![None, Some("x".to_string())])
        }

        async fn save(
            &self,
            _model: &ModelClass,
            _key_name: &str,
            _key_value: &str,
            _property_name: &str,
            _value: Option<String>,
        ) -> Result<(), OAuth2Error> {
            Err(OAuth2Error::server_error("connection reset"))
        }

        async fn healthcheck(&self) -> Result<(), OAuth2Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn results_pass_through_and_are_counted() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = ObservedRecordStore::new(Arc::new(FailingStore), "test".to_string())
            .with_metrics(metrics.clone());
        let model = ModelClass::new("creds");

        let rows = store.filter(&model, "k", "v", "p").await.unwrap();
        assert_eq!(rows, vec![None, Some("x".to_string())]);

        let err = store
            .save(&model, "k", "v", "p", Some("blob".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, OAuth2Error::server_error("connection reset"));

        let counter = &metrics.storage_operations_total;
        assert_eq!(counter.with_label_values(&["filter", "ok"]).get(), 1);
        assert_eq!(counter.with_label_values(&["save", "error"]).get(), 1);
    }
}
