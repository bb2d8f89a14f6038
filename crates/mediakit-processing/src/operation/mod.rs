//! Operation descriptors: name, capability set, parameter schema and validation

pub mod params;

use mediakit_core::{Capabilities, MediaKind, OperationName, ValidationError};
use serde::Serialize;
use std::collections::BTreeMap;

pub use params::{params, ParamKind, ParamSpec, ParamValue, Parameters, ValidatedParameters};

/// Cross-parameter check run after every individual parameter passed.
/// Returns the violated constraint as a message.
pub type ConstraintCheck = fn(&ValidatedParameters) -> Result<(), String>;

/// Check that also depends on the kind of asset flowing into the stage
pub type KindConstraintCheck = fn(MediaKind, &ValidatedParameters) -> Result<(), String>;

/// Kind of asset an operation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    SameAsInput,
    Fixed(MediaKind),
}

/// A named, parametrized transformation descriptor
#[derive(Debug, Clone)]
pub struct Operation {
    name: OperationName,
    applies_to: Capabilities,
    output: OutputKind,
    summary: &'static str,
    params: Vec<ParamSpec>,
    constraint: Option<ConstraintCheck>,
    kind_constraint: Option<KindConstraintCheck>,
}

/// What a UI collaborator needs to render controls for an operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: OperationName,
    pub applies_to: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<MediaKind>,
    pub summary: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl Operation {
    pub fn new(name: OperationName, applies_to: Capabilities) -> Self {
        Self {
            name,
            applies_to,
            output: OutputKind::SameAsInput,
            summary: "",
            params: Vec::new(),
            constraint: None,
            kind_constraint: None,
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn with_output(mut self, kind: MediaKind) -> Self {
        self.output = OutputKind::Fixed(kind);
        self
    }

    pub fn with_summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_constraint(mut self, check: ConstraintCheck) -> Self {
        self.constraint = Some(check);
        self
    }

    pub fn with_kind_constraint(mut self, check: KindConstraintCheck) -> Self {
        self.kind_constraint = Some(check);
        self
    }

    pub fn name(&self) -> OperationName {
        self.name
    }

    pub fn applies_to(&self) -> Capabilities {
        self.applies_to
    }

    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.applies_to.contains(kind)
    }

    /// Kind of the asset this operation produces from an input of `input` kind
    pub fn output_kind(&self, input: MediaKind) -> MediaKind {
        match self.output {
            OutputKind::SameAsInput => input,
            OutputKind::Fixed(kind) => kind,
        }
    }

    pub fn parameters(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Check every supplied parameter for type and range, fill defaults, and
    /// run the cross-parameter constraint. Unknown names are rejected.
    pub fn validate(&self, supplied: &Parameters) -> Result<ValidatedParameters, ValidationError> {
        if let Some(unknown) = supplied
            .keys()
            .find(|key| !self.params.iter().any(|p| p.name == key.as_str()))
        {
            return Err(ValidationError::UnknownParameter {
                operation: self.name,
                parameter: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for spec in &self.params {
            let value = match (supplied.get(spec.name), &spec.default) {
                (Some(value), _) => spec.check(self.name, value)?,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(ValidationError::MissingParameter {
                        operation: self.name,
                        parameter: spec.name.to_string(),
                    })
                }
            };
            values.insert(spec.name.to_string(), value);
        }

        let validated = ValidatedParameters::new(values);
        if let Some(check) = self.constraint {
            check(&validated).map_err(|message| ValidationError::Constraint {
                operation: self.name,
                message,
            })?;
        }

        Ok(validated)
    }

    /// [`Operation::validate`] plus the checks that depend on the incoming kind
    pub fn validate_for(
        &self,
        input: MediaKind,
        supplied: &Parameters,
    ) -> Result<ValidatedParameters, ValidationError> {
        let validated = self.validate(supplied)?;
        if let Some(check) = self.kind_constraint {
            check(input, &validated).map_err(|message| ValidationError::Constraint {
                operation: self.name,
                message,
            })?;
        }
        Ok(validated)
    }

    pub fn describe(&self) -> OperationDescriptor {
        OperationDescriptor {
            name: self.name,
            applies_to: self.applies_to,
            produces: match self.output {
                OutputKind::SameAsInput => None,
                OutputKind::Fixed(kind) => Some(kind),
            },
            summary: self.summary,
            parameters: self.params.clone(),
        }
    }
}
