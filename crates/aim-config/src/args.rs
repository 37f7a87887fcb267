//! Command-line argument synthesis for tools that take settings as flags.

use std::collections::BTreeMap;

use crate::types::ArgStyle;

/// Values argument synthesis reads.
#[derive(Debug, Clone, Copy)]
pub struct ArgsInput<'a> {
    pub style: ArgStyle,
    pub provider: &'a str,
    pub display_name: &'a str,
    pub base_url: &'a str,
    pub model: &'a str,
    /// Vendor's key variable for this tool, if declared.
    pub env_key: Option<&'a str>,
    /// Already-built environment.
    pub env_vars: &'a BTreeMap<String, String>,
}

/// Build the extra arguments for a tool run.
pub fn build_cli_args(input: &ArgsInput<'_>) -> Vec<String> {
    match input.style {
        ArgStyle::None => Vec::new(),
        ArgStyle::Codex => codex_args(input),
        ArgStyle::ModelFlag => model_flag_args(input),
    }
}

fn codex_args(input: &ArgsInput<'_>) -> Vec<String> {
    let mut args = Vec::new();
    let mut set = |value: String| {
        args.push("-c".to_string());
        args.push(value);
    };

    let provider = input.provider;
    if !provider.is_empty() {
        let name = if input.display_name.is_empty() {
            provider
        } else {
            input.display_name
        };
        set(format!("model_provider={}", provider));
        set(format!("model_providers.{}.name={}", provider, name));

        if !input.base_url.is_empty() {
            set(format!("model_providers.{}.base_url={}", provider, input.base_url));
        }

        if let Some(var) = input.env_key.filter(|v| input.env_vars.contains_key(*v)) {
            set(format!("model_providers.{}.env_key={}", provider, var));
        }
    }

    if !input.model.is_empty() {
        set(format!("model={}", input.model));
    }

    args
}

fn model_flag_args(input: &ArgsInput<'_>) -> Vec<String> {
    match (input.provider.is_empty(), input.model.is_empty()) {
        (_, true) => Vec::new(),
        (true, false) => vec!["-m".to_string(), input.model.to_string()],
        (false, false) => vec![
            "-m".to_string(),
            format!("{}/{}", input.provider, input.model),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input<'a>(style: ArgStyle, env_vars: &'a BTreeMap<String, String>) -> ArgsInput<'a> {
        ArgsInput {
            style,
            provider: "glm",
            display_name: "GLM",
            base_url: "https://open.bigmodel.cn/api/paas/v4",
            model: "glm-4.6",
            env_key: Some("GLM_API_KEY"),
            env_vars,
        }
    }

    #[test]
    fn test_none_style_is_empty() {
        let env = BTreeMap::new();
        assert!(build_cli_args(&input(ArgStyle::None, &env)).is_empty());
    }

    #[test]
    fn test_codex_full() {
        let env = BTreeMap::from([("GLM_API_KEY".to_string(), "sk".to_string())]);
        assert_eq!(
            build_cli_args(&input(ArgStyle::Codex, &env)),
            vec![
                "-c",
                "model_provider=glm",
                "-c",
                "model_providers.glm.name=GLM",
                "-c",
                "model_providers.glm.base_url=https://open.bigmodel.cn/api/paas/v4",
                "-c",
                "model_providers.glm.env_key=GLM_API_KEY",
                "-c",
                "model=glm-4.6",
            ]
        );
    }

    #[test]
    fn test_codex_env_key_needs_variable() {
        let env = BTreeMap::new();
        let args = build_cli_args(&input(ArgStyle::Codex, &env));
        assert!(!args.iter().any(|a| a.contains("env_key")));
    }

    #[test]
    fn test_codex_without_provider_only_model() {
        let env = BTreeMap::new();
        let args = build_cli_args(&ArgsInput {
            provider: "",
            ..input(ArgStyle::Codex, &env)
        });
        assert_eq!(args, vec!["-c", "model=glm-4.6"]);
    }

    #[test]
    fn test_codex_name_falls_back_to_provider() {
        let env = BTreeMap::new();
        let args = build_cli_args(&ArgsInput {
            display_name: "",
            base_url: "",
            ..input(ArgStyle::Codex, &env)
        });
        assert_eq!(args[3], "model_providers.glm.name=glm");
        assert_eq!(args.len(), 6);
    }

    #[test]
    fn test_model_flag() {
        let env = BTreeMap::new();
        assert_eq!(
            build_cli_args(&input(ArgStyle::ModelFlag, &env)),
            vec!["-m", "glm/glm-4.6"]
        );
        assert_eq!(
            build_cli_args(&ArgsInput {
                provider: "",
                ..input(ArgStyle::ModelFlag, &env)
            }),
            vec!["-m", "glm-4.6"]
        );
        assert!(
            build_cli_args(&ArgsInput {
                model: "",
                ..input(ArgStyle::ModelFlag, &env)
            })
            .is_empty()
        );
    }
}
