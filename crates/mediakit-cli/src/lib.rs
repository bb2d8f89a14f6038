use anyhow::{anyhow, Context};
use mediakit_processing::{ParamValue, Parameters};

/// One `--op` argument: `name` or `name:key=value,key=value`
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub name: String,
    pub params: Parameters,
}

/// Parse a stage argument such as `blur:kernel_size=5` or
/// `color-filter:filter=sepia,factor=1.2`.
pub fn parse_stage_spec(spec: &str) -> anyhow::Result<StageSpec> {
    let (name, rest) = match spec.split_once(':') {
        Some((name, rest)) => (name.trim(), rest.trim()),
        None => (spec.trim(), ""),
    };
    if name.is_empty() {
        return Err(anyhow!("Missing operation name in '{}'", spec));
    }

    let mut params = Parameters::new();
    for pair in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Empty parameter name in '{}'", pair));
        }
        if params
            .insert(key.to_string(), ParamValue::parse(value.trim()))
            .is_some()
        {
            return Err(anyhow!("Parameter '{}' given twice", key));
        }
    }

    Ok(StageSpec {
        name: name.to_string(),
        params,
    })
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for the CLI. Production environments log JSON.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
