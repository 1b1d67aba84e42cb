//! The gated boundary a transport calls into.
//!
//! Each call checks the feature flag, then the caller's permission, then runs
//! the matching [`FieldService`] operation. Mutations are written to the
//! audit [`LogSink`] whether they succeed or fail; reads are not logged.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use cpa_fields::{FieldId, PropertyField, PropertyFieldPatch, RawPropertyField};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::ReadPolicy;
use crate::error::{Result, ServiceError};
use crate::log::{LogEntry, LogSink, TracingLogSink};
use crate::service::FieldService;

/// Identity presented with a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    Anonymous,
    User { user_id: String },
    /// Local-mode administration, e.g. a server-side CLI.
    Local,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::User { user_id } => write!(f, "user:{user_id}"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Decides who may manage field definitions.
pub trait PermissionChecker: Send + Sync {
    fn has_admin_capability(&self, actor: &Actor) -> bool;
}

/// A fixed set of admin user IDs. `Actor::Local` is always an admin.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    admins: HashSet<String>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, user_id: impl Into<String>) -> Self {
        self.admins.insert(user_id.into());
        self
    }
}

impl PermissionChecker for StaticPermissions {
    fn has_admin_capability(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Local => true,
            Actor::User { user_id } => self.admins.contains(user_id),
            Actor::Anonymous => false,
        }
    }
}

/// JSON form of an audit payload. A value that cannot be serialized is
/// recorded as `{"error": ...}` and reported with a warning.
fn audit_value<T: Serialize + ?Sized>(op: &str, value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(op, %e, "audit payload could not be serialized");
        json!({ "error": format!("unserializable payload: {e}") })
    })
}

/// Feature- and permission-gated access to a [`FieldService`].
pub struct FieldsApi {
    service: FieldService,
    permissions: Arc<dyn PermissionChecker>,
    log: Arc<dyn LogSink>,
}

impl FieldsApi {
    pub fn new(service: FieldService, permissions: Arc<dyn PermissionChecker>) -> Self {
        Self {
            service,
            permissions,
            log: Arc::new(TracingLogSink),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn service(&self) -> &FieldService {
        &self.service
    }

    fn ensure_admin(&self, actor: &Actor, action: &str) -> Result<()> {
        if self.permissions.has_admin_capability(actor) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(actor, action))
        }
    }

    fn ensure_can_read(&self, actor: &Actor) -> Result<()> {
        match self.service.config().read_policy {
            ReadPolicy::Anyone => Ok(()),
            ReadPolicy::Authenticated if actor.is_authenticated() => Ok(()),
            ReadPolicy::Authenticated => Err(ServiceError::forbidden(actor, "read")),
        }
    }

    /// Run `op` and record the outcome in the audit log.
    async fn logged<T, F>(&self, op: &str, actor: &Actor, input: Value, fut: F) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let output = match &result {
            Ok(value) => audit_value(op, value),
            Err(e) => json!({ "error": e.to_string() }),
        };
        let entry = LogEntry::new(
            op,
            input,
            output,
            Some(actor.to_string()),
            start.elapsed().as_millis() as u64,
        );
        self.log.record(entry).await;
        result
    }

    /// Decode a wire-shape field and create it.
    pub async fn create_field(
        &self,
        actor: &Actor,
        raw: RawPropertyField,
    ) -> Result<PropertyField> {
        self.service.ensure_enabled()?;
        let input = audit_value("create field", &raw);
        self.logged("create field", actor, input, async {
            self.ensure_admin(actor, "create")?;
            let field = PropertyField::try_from(raw)?;
            self.service.create_field(field).await
        })
        .await
    }

    pub async fn list_fields(&self, actor: &Actor) -> Result<Vec<PropertyField>> {
        self.service.ensure_enabled()?;
        self.ensure_can_read(actor)?;
        self.service.list_fields().await
    }

    pub async fn get_field(&self, actor: &Actor, id: &FieldId) -> Result<PropertyField> {
        self.service.ensure_enabled()?;
        self.ensure_can_read(actor)?;
        self.service.get_field(id).await
    }

    pub async fn patch_field(
        &self,
        actor: &Actor,
        id: &FieldId,
        patch: &PropertyFieldPatch,
    ) -> Result<PropertyField> {
        self.service.ensure_enabled()?;
        let input = json!({ "id": id, "patch": patch });
        self.logged("patch field", actor, input, async {
            self.ensure_admin(actor, "patch")?;
            self.service.patch_field(id, patch).await
        })
        .await
    }

    pub async fn delete_field(&self, actor: &Actor, id: &FieldId) -> Result<()> {
        self.service.ensure_enabled()?;
        let input = json!({ "id": id });
        self.logged("delete field", actor, input, async {
            self.ensure_admin(actor, "delete")?;
            self.service.delete_field(id).await?;
            Ok::<_, ServiceError>(json!({ "deleted": true, "id": id }))
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldsConfig;
    use crate::error::ErrorKind;
    use crate::log::MemoryLogSink;
    use crate::store::MemoryFieldStore;
    use rstest::rstest;

    fn make_api(config: FieldsConfig) -> (FieldsApi, Arc<MemoryLogSink>) {
        let service = FieldService::new(Arc::new(MemoryFieldStore::new()), config);
        let log = Arc::new(MemoryLogSink::new());
        let api = FieldsApi::new(
            service,
            Arc::new(StaticPermissions::new().with_admin("admin")),
        )
        .with_log(log.clone());
        (api, log)
    }

    fn raw_text(name: &str) -> RawPropertyField {
        RawPropertyField {
            name: name.into(),
            field_type: "text".into(),
            ..Default::default()
        }
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no JSON form"))
        }
    }

    #[test]
    fn test_audit_value_records_serialization_failure() {
        let value = audit_value("create field", &Unserializable);
        assert_eq!(value["error"], "unserializable payload: no JSON form");

        let value = audit_value("create field", &raw_text("x"));
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::Anonymous.to_string(), "anonymous");
        assert_eq!(Actor::user("abc").to_string(), "user:abc");
        assert_eq!(Actor::Local.to_string(), "local");
    }

    #[rstest]
    #[case::local(Actor::Local, true)]
    #[case::listed_admin(Actor::user("root"), true)]
    #[case::plain_user(Actor::user("bob"), false)]
    #[case::anonymous(Actor::Anonymous, false)]
    fn test_static_permissions(#[case] actor: Actor, #[case] expected: bool) {
        let perms = StaticPermissions::new().with_admin("root");
        assert_eq!(perms.has_admin_capability(&actor), expected);
    }

    #[tokio::test]
    async fn test_create_decodes_wire_shape() {
        let (api, _) = make_api(FieldsConfig::enabled());
        let field = api
            .create_field(&Actor::user("admin"), raw_text("Nickname"))
            .await
            .unwrap();
        assert_eq!(field.name, "Nickname");
        assert!(!field.id.is_empty());
    }

    #[tokio::test]
    async fn test_create_unknown_type_is_invalid() {
        let (api, log) = make_api(FieldsConfig::enabled());
        let mut raw = raw_text("x");
        raw.field_type = "phone".into();
        let err = api.create_field(&Actor::Local, raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);

        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_error());
    }

    #[tokio::test]
    async fn test_non_admin_mutations_are_forbidden() {
        let (api, log) = make_api(FieldsConfig::enabled());
        let bob = Actor::user("bob");
        let field = api
            .create_field(&Actor::Local, raw_text("x"))
            .await
            .unwrap();

        let errors = [
            api.create_field(&bob, raw_text("y")).await.unwrap_err(),
            api.patch_field(&bob, &field.id, &PropertyFieldPatch::new().with_name("z"))
                .await
                .unwrap_err(),
            api.delete_field(&bob, &field.id).await.unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        assert_eq!(api.get_field(&bob, &field.id).await.unwrap().name, "x");
        assert_eq!(log.entries().await.len(), 4);
    }

    #[tokio::test]
    async fn test_read_policy() {
        let (gated, _) = make_api(FieldsConfig::enabled());
        gated.create_field(&Actor::Local, raw_text("x")).await.unwrap();

        assert_eq!(gated.list_fields(&Actor::user("bob")).await.unwrap().len(), 1);
        let err = gated.list_fields(&Actor::Anonymous).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let (open, _) = make_api(FieldsConfig::enabled().with_read_policy(ReadPolicy::Anyone));
        assert!(open.list_fields(&Actor::Anonymous).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feature_check_comes_first() {
        let (api, log) = make_api(FieldsConfig::default());
        let bob = Actor::user("bob");

        let err = api.create_field(&bob, raw_text("x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureDisabled);
        let err = api.list_fields(&Actor::Anonymous).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureDisabled);
        let err = api.delete_field(&bob, &FieldId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureDisabled);

        assert!(log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_are_not_logged() {
        let (api, log) = make_api(FieldsConfig::enabled());
        let field = api.create_field(&Actor::Local, raw_text("x")).await.unwrap();
        api.list_fields(&Actor::Local).await.unwrap();
        api.get_field(&Actor::Local, &field.id).await.unwrap();
        api.delete_field(&Actor::Local, &field.id).await.unwrap();

        let entries = log.entries().await;
        let ops: Vec<_> = entries.iter().map(|e| e.op.as_str()).collect();
        assert_eq!(ops, vec!["create field", "delete field"]);
        assert_eq!(entries[1].output["deleted"], true);
        assert_eq!(entries[1].output["id"], field.id.as_str());
        assert_eq!(entries[1].actor.as_deref(), Some("local"));
    }
}
