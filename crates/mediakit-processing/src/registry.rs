//! Operation registry
//!
//! Maps operation names to their descriptor (capabilities + parameter
//! validator) and executor. Built once at startup and read-only afterwards, so
//! lookups from concurrent pipelines need no locking.

use mediakit_core::{
    DuplicateOperationError, MediaConfig, OperationName, UnknownOperationError,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::asset::MediaAsset;
use crate::operation::{Operation, OperationDescriptor, ValidatedParameters};

/// The external function that performs an operation on an asset
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        input: &MediaAsset,
        params: &ValidatedParameters,
    ) -> anyhow::Result<MediaAsset>;
}

impl<F> Executor for F
where
    F: Fn(&MediaAsset, &ValidatedParameters) -> anyhow::Result<MediaAsset> + Send + Sync,
{
    fn execute(
        &self,
        input: &MediaAsset,
        params: &ValidatedParameters,
    ) -> anyhow::Result<MediaAsset> {
        self(input, params)
    }
}

/// Registry entry: validator and executor of one operation
#[derive(Clone)]
pub struct RegisteredOperation {
    operation: Operation,
    executor: Arc<dyn Executor>,
}

impl RegisteredOperation {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }
}

impl fmt::Debug for RegisteredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredOperation")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    entries: HashMap<OperationName, RegisteredOperation>,
}

static GLOBAL: OnceLock<Arc<OperationRegistry>> = OnceLock::new();

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation bound to the configured tools
    pub fn with_builtins(config: &MediaConfig) -> Result<Self, DuplicateOperationError> {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry, config)?;
        Ok(registry)
    }

    /// Process-wide registry, built from the environment on first use
    pub fn global() -> Result<Arc<OperationRegistry>, DuplicateOperationError> {
        if let Some(registry) = GLOBAL.get() {
            return Ok(registry.clone());
        }

        let config = MediaConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid media configuration, using defaults");
            MediaConfig::default()
        });
        let registry = Arc::new(Self::with_builtins(&config)?);
        Ok(GLOBAL.get_or_init(|| registry).clone())
    }

    /// Add an operation. An existing registration under the same name is
    /// left untouched and reported as a duplicate.
    pub fn register<E>(
        &mut self,
        operation: Operation,
        executor: E,
    ) -> Result<(), DuplicateOperationError>
    where
        E: Executor + 'static,
    {
        let name = operation.name();
        if self.entries.contains_key(&name) {
            return Err(DuplicateOperationError { name });
        }
        tracing::debug!(
            operation = %name,
            applies_to = %operation.applies_to(),
            "Registered operation"
        );
        self.entries.insert(
            name,
            RegisteredOperation {
                operation,
                executor: Arc::new(executor),
            },
        );
        Ok(())
    }

    pub fn resolve(
        &self,
        name: OperationName,
    ) -> Result<&RegisteredOperation, UnknownOperationError> {
        self.entries
            .get(&name)
            .ok_or_else(|| UnknownOperationError::new(name.as_str()))
    }

    /// Resolve a user-supplied operation name
    pub fn resolve_str(&self, name: &str) -> Result<&RegisteredOperation, UnknownOperationError> {
        let parsed: OperationName = name.parse()?;
        self.resolve(parsed)
    }

    pub fn contains(&self, name: OperationName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in catalogue order
    pub fn names(&self) -> Vec<OperationName> {
        OperationName::ALL
            .iter()
            .copied()
            .filter(|name| self.entries.contains_key(name))
            .collect()
    }

    /// Schemas of every registered operation, for rendering controls
    pub fn describe_all(&self) -> Vec<OperationDescriptor> {
        self.names()
            .into_iter()
            .filter_map(|name| self.entries.get(&name))
            .map(|entry| entry.operation.describe())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ParamSpec;
    use image::{DynamicImage, RgbImage};
    use mediakit_core::Capabilities;

    fn identity(input: &MediaAsset, _: &ValidatedParameters) -> anyhow::Result<MediaAsset> {
        Ok(input.clone())
    }

    fn failing(_: &MediaAsset, _: &ValidatedParameters) -> anyhow::Result<MediaAsset> {
        Err(anyhow::anyhow!("should never run"))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                Operation::new(OperationName::Grayscale, Capabilities::VISUAL),
                identity,
            )
            .unwrap();

        let entry = registry.resolve(OperationName::Grayscale).unwrap();
        assert_eq!(entry.operation().name(), OperationName::Grayscale);

        let asset = MediaAsset::from_image(DynamicImage::ImageRgb8(RgbImage::new(3, 3))).unwrap();
        let out = entry
            .executor()
            .execute(&asset, &ValidatedParameters::default())
            .unwrap();
        assert_eq!(out, asset);
    }

    #[test]
    fn test_duplicate_registration_keeps_original() {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                Operation::new(OperationName::Blur, Capabilities::IMAGE)
                    .with_param(ParamSpec::integer("kernel_size", 1, 21).with_default(5)),
                identity,
            )
            .unwrap();

        let err = registry
            .register(Operation::new(OperationName::Blur, Capabilities::VISUAL), failing)
            .unwrap_err();
        assert_eq!(err.name, OperationName::Blur);

        let entry = registry.resolve(OperationName::Blur).unwrap();
        assert_eq!(entry.operation().applies_to(), Capabilities::IMAGE);
        assert_eq!(entry.operation().parameters().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = OperationRegistry::new();
        assert_eq!(
            registry.resolve(OperationName::Trim).unwrap_err(),
            UnknownOperationError::new("trim")
        );
        assert_eq!(
            registry.resolve_str("vintage").unwrap_err(),
            UnknownOperationError::new("vintage")
        );
    }

    #[test]
    fn test_builtins_cover_catalogue() {
        let registry = OperationRegistry::with_builtins(&MediaConfig::default()).unwrap();
        assert_eq!(registry.names(), OperationName::ALL.to_vec());
        assert!(registry.resolve_str("Edge_Detect").is_ok());

        let described = registry.describe_all();
        assert_eq!(described.len(), OperationName::ALL.len());
        assert_eq!(described[0].name, OperationName::ALL[0]);
    }

    #[test]
    fn test_builtins_cannot_be_registered_twice() {
        let mut registry = OperationRegistry::with_builtins(&MediaConfig::default()).unwrap();
        let err = crate::builtin::register_builtins(&mut registry, &MediaConfig::default())
            .unwrap_err();
        assert_eq!(err.name, OperationName::ALL[0]);
    }
}
