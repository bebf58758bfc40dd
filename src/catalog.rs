//! Scenario catalog: intents, scenarios and the default answer.
//!
//! The catalog is read once at startup and validated as a whole, so a broken
//! step graph stops the bot before it answers anybody.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::handlers::{self, RegisteredHandler};
use crate::template::{Template, TemplateError};

const BUILTIN_CATALOG: &str = include_str!("../catalog.yaml");

/// Context keys a finished scenario must have collected.
const REGISTRATION_FIELDS: &[&str] = &["name", "email"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("can't parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("scenario `{scenario}`: first step `{step}` does not exist")]
    MissingFirstStep { scenario: String, step: String },
    #[error("scenario `{scenario}`: first step `{step}` is terminal")]
    TerminalFirstStep { scenario: String, step: String },
    #[error("scenario `{scenario}`, step `{step}`: next step `{next}` does not exist")]
    DanglingNextStep {
        scenario: String,
        step: String,
        next: String,
    },
    #[error("scenario `{scenario}`, step `{step}`: no handler")]
    MissingHandler { scenario: String, step: String },
    #[error("scenario `{scenario}`, step `{step}`: unknown handler `{handler}`")]
    UnknownHandler {
        scenario: String,
        step: String,
        handler: String,
    },
    #[error("scenario `{scenario}`, step `{step}`: no failure text")]
    MissingFailureText { scenario: String, step: String },
    #[error("scenario `{scenario}`, step `{step}`: {source}")]
    Template {
        scenario: String,
        step: String,
        source: TemplateError,
    },
    #[error("scenario `{scenario}`, step `{step}`: field `{field}` is not collected before it is shown")]
    UnknownField {
        scenario: String,
        step: String,
        field: String,
    },
    #[error("scenario `{scenario}`: steps loop back to `{step}`")]
    StepCycle { scenario: String, step: String },
    #[error("scenario `{scenario}`: finishes without collecting `{field}`")]
    IncompleteRegistration { scenario: String, field: String },
    #[error("intent `{intent}`: no tokens")]
    IntentWithoutTokens { intent: String },
    #[error("intent `{intent}`: empty token")]
    EmptyToken { intent: String },
    #[error("intent `{intent}`: exactly one of `answer` and `scenario` must be set")]
    AmbiguousIntent { intent: String },
    #[error("intent `{intent}`: unknown scenario `{scenario}`")]
    UnknownScenario { intent: String, scenario: String },
}

#[derive(Deserialize)]
struct RawCatalog {
    default_answer: String,
    #[serde(default)]
    intents: Vec<RawIntent>,
    #[serde(default)]
    scenarios: BTreeMap<String, RawScenario>,
}

#[derive(Deserialize)]
struct RawIntent {
    name: Option<String>,
    tokens: Vec<String>,
    answer: Option<String>,
    scenario: Option<String>,
}

#[derive(Deserialize)]
struct RawScenario {
    first_step: String,
    steps: BTreeMap<String, RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    text: String,
    handler: Option<String>,
    failure_text: Option<String>,
    next_step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    Answer(String),
    StartScenario(String),
}

#[derive(Debug, Clone)]
pub struct Intent {
    pub name: String,
    tokens: Vec<String>,
    pub action: IntentAction,
}

impl Intent {
    /// Case-insensitive substring test against every token.
    fn matches(&self, lowercase_text: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| lowercase_text.contains(token.as_str()))
    }
}

#[derive(Debug)]
pub enum StepKind {
    /// Shown when the scenario completes; never waits for input.
    Terminal,
    Prompt {
        handler: &'static RegisteredHandler,
        failure_text: Template,
        next_step: String,
    },
}

#[derive(Debug)]
pub struct Step {
    pub name: String,
    pub text: Template,
    pub kind: StepKind,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StepKind::Terminal)
    }
}

#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    pub first_step: String,
    steps: HashMap<String, Step>,
}

impl Scenario {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }
}

#[derive(Debug)]
pub struct Catalog {
    default_answer: String,
    intents: Vec<Intent>,
    scenarios: HashMap<String, Scenario>,
}

impl Catalog {
    /// The conference registration script shipped with the bot.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let raw: RawCatalog = serde_yaml::from_str(source)?;

        let scenarios = raw
            .scenarios
            .into_iter()
            .map(|(name, scenario)| build_scenario(name.clone(), scenario).map(|s| (name, s)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let intents = raw
            .intents
            .into_iter()
            .enumerate()
            .map(|(index, intent)| build_intent(index, intent, &scenarios))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Catalog {
            default_answer: raw.default_answer,
            intents,
            scenarios,
        })
    }

    pub fn default_answer(&self) -> &str {
        &self.default_answer
    }

    /// First intent in declared order with a token contained in `text`.
    pub fn match_intent(&self, text: &str) -> Option<&Intent> {
        let text = text.to_lowercase();
        self.intents.iter().find(|intent| intent.matches(&text))
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }
}

fn build_intent(
    index: usize,
    raw: RawIntent,
    scenarios: &HashMap<String, Scenario>,
) -> Result<Intent, ConfigError> {
    let name = raw.name.unwrap_or_else(|| format!("#{}", index));

    if raw.tokens.is_empty() {
        return Err(ConfigError::IntentWithoutTokens { intent: name });
    }
    if raw.tokens.iter().any(|token| token.trim().is_empty()) {
        return Err(ConfigError::EmptyToken { intent: name });
    }

    let answer = raw.answer.filter(|answer| !answer.is_empty());
    let scenario = raw.scenario.filter(|scenario| !scenario.is_empty());
    let action = match (answer, scenario) {
        (Some(answer), None) => IntentAction::Answer(answer),
        (None, Some(scenario)) => {
            if !scenarios.contains_key(&scenario) {
                return Err(ConfigError::UnknownScenario {
                    intent: name,
                    scenario,
                });
            }
            IntentAction::StartScenario(scenario)
        }
        _ => return Err(ConfigError::AmbiguousIntent { intent: name }),
    };

    Ok(Intent {
        tokens: raw.tokens.iter().map(|token| token.to_lowercase()).collect(),
        name,
        action,
    })
}

fn build_scenario(name: String, raw: RawScenario) -> Result<Scenario, ConfigError> {
    let step_names: HashSet<&str> = raw.steps.keys().map(String::as_str).collect();
    let mut steps = HashMap::new();

    for (step_name, raw_step) in &raw.steps {
        let parse = |source: &str| {
            Template::parse(source).map_err(|source| ConfigError::Template {
                scenario: name.clone(),
                step: step_name.clone(),
                source,
            })
        };
        let text = parse(&raw_step.text)?;

        let next_step = raw_step.next_step.clone().filter(|next| !next.is_empty());
        let kind = match next_step {
            None => StepKind::Terminal,
            Some(next_step) => {
                if !step_names.contains(next_step.as_str()) {
                    return Err(ConfigError::DanglingNextStep {
                        scenario: name.clone(),
                        step: step_name.clone(),
                        next: next_step,
                    });
                }
                let handler_name = raw_step.handler.as_deref().ok_or_else(|| {
                    ConfigError::MissingHandler {
                        scenario: name.clone(),
                        step: step_name.clone(),
                    }
                })?;
                let handler =
                    handlers::lookup(handler_name).ok_or_else(|| ConfigError::UnknownHandler {
                        scenario: name.clone(),
                        step: step_name.clone(),
                        handler: handler_name.to_string(),
                    })?;
                let failure_text = raw_step.failure_text.as_deref().ok_or_else(|| {
                    ConfigError::MissingFailureText {
                        scenario: name.clone(),
                        step: step_name.clone(),
                    }
                })?;
                StepKind::Prompt {
                    handler,
                    failure_text: parse(failure_text)?,
                    next_step,
                }
            }
        };

        steps.insert(
            step_name.clone(),
            Step {
                name: step_name.clone(),
                text,
                kind,
            },
        );
    }

    let scenario = Scenario {
        name,
        first_step: raw.first_step,
        steps,
    };
    check_step_chain(&scenario)?;
    Ok(scenario)
}

/// Walks the scenario from its first step and checks that every template only
/// uses fields collected by earlier handlers.
fn check_step_chain(scenario: &Scenario) -> Result<(), ConfigError> {
    let first = scenario
        .step(&scenario.first_step)
        .ok_or_else(|| ConfigError::MissingFirstStep {
            scenario: scenario.name.clone(),
            step: scenario.first_step.clone(),
        })?;
    if first.is_terminal() {
        return Err(ConfigError::TerminalFirstStep {
            scenario: scenario.name.clone(),
            step: first.name.clone(),
        });
    }

    let unknown_field = |known: &BTreeSet<&'static str>, step: &Step, template: &Template| {
        first_unknown_field(known, template).map(|field| ConfigError::UnknownField {
            scenario: scenario.name.clone(),
            step: step.name.clone(),
            field,
        })
    };

    let mut known: BTreeSet<&'static str> = BTreeSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut step = first;

    loop {
        visited.insert(step.name.as_str());
        // The first prompt is sent as written, before anything is collected.
        if step.name != scenario.first_step {
            if let Some(error) = unknown_field(&known, step, &step.text) {
                return Err(error);
            }
        }

        match &step.kind {
            StepKind::Terminal => {
                if let Some(field) = REGISTRATION_FIELDS.iter().find(|f| !known.contains(**f)) {
                    return Err(ConfigError::IncompleteRegistration {
                        scenario: scenario.name.clone(),
                        field: field.to_string(),
                    });
                }
                break;
            }
            StepKind::Prompt {
                handler,
                failure_text,
                next_step,
            } => {
                if let Some(error) = unknown_field(&known, step, failure_text) {
                    return Err(error);
                }
                known.extend(handler.provides.iter().copied());

                if visited.contains(next_step.as_str()) {
                    return Err(ConfigError::StepCycle {
                        scenario: scenario.name.clone(),
                        step: next_step.clone(),
                    });
                }
                // Dangling references were rejected while building the steps.
                step = match scenario.step(next_step) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }

    for name in scenario.steps.keys() {
        if !visited.contains(name.as_str()) {
            log::warn!(
                "Step {} of scenario {} is unreachable",
                name,
                scenario.name
            );
        }
    }

    Ok(())
}

fn first_unknown_field(known: &BTreeSet<&'static str>, template: &Template) -> Option<String> {
    template
        .fields()
        .find(|field| !known.contains(*field))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
default_answer: "?"
intents:
  - tokens: ["reg"]
    scenario: reg
scenarios:
  reg:
    first_step: ask_name
    steps:
      ask_name:
        text: Name?
        failure_text: Name, please.
        handler: capture_name
        next_step: ask_email
      ask_email:
        text: Email, {name}?
        failure_text: Bad email, {name}.
        handler: capture_email
        next_step: done
      done:
        text: Thanks {name} <{email}>
"#;

    fn with(replace: &str, by: &str) -> Result<Catalog, ConfigError> {
        Catalog::from_yaml(&MINIMAL.replace(replace, by))
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        let registration = catalog.scenario("registration").unwrap();
        assert_eq!(registration.first_step, "step1");
        assert!(registration.step("step3").unwrap().is_terminal());
        assert!(!catalog.default_answer().is_empty());
    }

    #[test]
    fn intents_match_case_insensitively_in_declared_order() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.match_intent("А КОГДА?").unwrap().name, "date");
        assert_eq!(catalog.match_intent("Где будет конференция?").unwrap().name, "place");
        assert_eq!(
            catalog.match_intent("Зарегистрируй меня").unwrap().action,
            IntentAction::StartScenario("registration".to_string())
        );
        assert!(catalog.match_intent("Hi").is_none());
    }

    #[test]
    fn first_matching_intent_wins() {
        let catalog = Catalog::from_yaml(
            r#"
default_answer: "?"
intents:
  - name: first
    tokens: ["a"]
    answer: one
  - name: second
    tokens: ["ab"]
    answer: two
"#,
        )
        .unwrap();
        assert_eq!(catalog.match_intent("AB").unwrap().name, "first");
    }

    #[test]
    fn minimal_catalog_loads() {
        let catalog = Catalog::from_yaml(MINIMAL).unwrap();
        assert!(catalog.scenario("reg").is_some());
    }

    #[test]
    fn dangling_next_step_is_rejected() {
        let err = with("next_step: done", "next_step: nowhere").unwrap_err();
        assert!(matches!(err, ConfigError::DanglingNextStep { next, .. } if next == "nowhere"));
    }

    #[test]
    fn unknown_handler_is_rejected() {
        let err = with("handler: capture_email", "handler: capture_phone").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHandler { handler, .. } if handler == "capture_phone"));
    }

    #[test]
    fn missing_first_step_is_rejected() {
        let err = with("first_step: ask_name", "first_step: greet").unwrap_err();
        assert!(matches!(err, ConfigError::MissingFirstStep { .. }));
    }

    #[test]
    fn terminal_first_step_is_rejected() {
        let err = with("first_step: ask_name", "first_step: done").unwrap_err();
        assert!(matches!(err, ConfigError::TerminalFirstStep { .. }));
    }

    #[test]
    fn fields_must_be_collected_before_use() {
        let err = with("Bad email, {name}.", "Bad email {email}.").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { field, .. } if field == "email"));

        let err = with("Email, {name}?", "Email, {nickname}?").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { field, .. } if field == "nickname"));
    }

    #[test]
    fn scenario_must_collect_registration_fields() {
        let err = Catalog::from_yaml(
            &MINIMAL
                .replace("handler: capture_email", "handler: capture_name")
                .replace(" <{email}>", ""),
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::IncompleteRegistration { field, .. } if field == "email")
        );
    }

    #[test]
    fn step_cycles_are_rejected() {
        let err = with("next_step: done", "next_step: ask_name").unwrap_err();
        assert!(matches!(err, ConfigError::StepCycle { step, .. } if step == "ask_name"));
    }

    #[test]
    fn malformed_template_is_rejected() {
        let err = with("Name, please.", "Name {please.").unwrap_err();
        assert!(matches!(err, ConfigError::Template { .. }));
    }

    #[test]
    fn intents_need_exactly_one_action() {
        let err = with("    scenario: reg", "    scenario: reg\n    answer: both").unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousIntent { .. }));

        let err = with("    scenario: reg", "    scenario: other").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScenario { .. }));

        let err = with(r#"tokens: ["reg"]"#, "tokens: []").unwrap_err();
        assert!(matches!(err, ConfigError::IntentWithoutTokens { .. }));

        let err = with(r#"tokens: ["reg"]"#, r#"tokens: [" "]"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyToken { .. }));
    }

    #[test]
    fn missing_catalog_file_is_an_io_error() {
        let err = Catalog::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
