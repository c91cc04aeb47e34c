//! Plugin-configuration catalog.
//!
//! Entity types for plugin configs (analyzers and their sibling plugin
//! kinds), their parameter schemas and per-owner parameter values, plus the
//! seed migrations that populate them.

pub mod doc_info;

use serde_json::json;

use crate::error::SchemaError;
use crate::schema::{EntityType, FieldDef, OnDelete, Schema};

/// Importable plugin implementation.
pub const PYTHON_MODULE: &str = "api_app.PythonModule";
/// Parameter declared by a python module.
pub const PARAMETER: &str = "api_app.Parameter";
/// Value of a parameter, global or per owner.
pub const PLUGIN_CONFIG: &str = "api_app.PluginConfig";
#[allow(missing_docs)]
pub const ORGANIZATION: &str = "api_app.Organization";
#[allow(missing_docs)]
pub const USER: &str = "auth.User";
#[allow(missing_docs)]
pub const PERIODIC_TASK: &str = "django_celery_beat.PeriodicTask";
/// Analyzer plugin; the primary entity of analyzer seeds.
pub const ANALYZER_CONFIG: &str = "analyzers_manager.AnalyzerConfig";
#[allow(missing_docs)]
pub const CONNECTOR_CONFIG: &str = "connectors_manager.ConnectorConfig";
#[allow(missing_docs)]
pub const VISUALIZER_CONFIG: &str = "visualizers_manager.VisualizerConfig";
#[allow(missing_docs)]
pub const INGESTOR_CONFIG: &str = "ingestors_manager.IngestorConfig";
#[allow(missing_docs)]
pub const PIVOT_CONFIG: &str = "pivots_manager.PivotConfig";

const BASE_PATHS: [&str; 7] = [
    "api_app.analyzers_manager.file_analyzers",
    "api_app.analyzers_manager.observable_analyzers",
    "api_app.connectors_manager.connectors",
    "api_app.visualizers_manager.visualizers",
    "api_app.ingestors_manager.ingestors",
    "api_app.pivots_manager.pivots",
    "api_app.playbooks_manager",
];

const PARAMETER_TYPES: [&str; 6] = ["list", "str", "bool", "int", "float", "dict"];

const TLP: [&str; 4] = ["CLEAR", "GREEN", "AMBER", "RED"];

fn python_module() -> EntityType {
    EntityType::new("api_app", "PythonModule")
        .field(
            FieldDef::string("module")
                .max_length(120)
                .pattern(r"^[a-z0-9_]+(\.[a-z0-9_]+)*\.[A-Za-z0-9_]+$"),
        )
        .field(FieldDef::string("base_path").max_length(120).choices(BASE_PATHS))
}

// Fields shared by every plugin kind.
fn plugin_config(app: &str, model: &str) -> EntityType {
    EntityType::new(app, model)
        .keyed_by("name")
        .field(FieldDef::string("name").max_length(100).pattern(r"^\w+$"))
        .field(FieldDef::reference("python_module", PYTHON_MODULE).on_delete(OnDelete::Restrict))
        .field(FieldDef::string("description").default_value(json!("")))
        .field(FieldDef::boolean("disabled").default_value(json!(false)))
        .field(FieldDef::multi_reference("disabled_in_organizations", ORGANIZATION))
        .field(FieldDef::int("soft_time_limit").default_value(json!(60)))
        .field(
            FieldDef::string("routing_key")
                .max_length(50)
                .default_value(json!("default")),
        )
        .field(FieldDef::boolean("health_check_status").default_value(json!(true)))
        .field(
            FieldDef::reference("health_check_task", PERIODIC_TASK)
                .nullable()
                .on_delete(OnDelete::SetNull),
        )
}

fn analyzer_config() -> EntityType {
    plugin_config("analyzers_manager", "AnalyzerConfig")
        .field(FieldDef::string("type").choices(["file", "observable"]))
        .field(FieldDef::boolean("docker_based").default_value(json!(false)))
        .field(
            FieldDef::string("maximum_tlp")
                .choices(TLP)
                .default_value(json!("RED")),
        )
        .field(FieldDef::list("observable_supported").default_value(json!([])))
        .field(FieldDef::list("supported_filetypes").default_value(json!([])))
        .field(FieldDef::list("not_supported_filetypes").default_value(json!([])))
        .field(FieldDef::boolean("run_hash").default_value(json!(false)))
        .field(
            FieldDef::string("run_hash_type")
                .choices(["", "md5", "sha256"])
                .default_value(json!("")),
        )
}

fn parameter() -> EntityType {
    EntityType::new("api_app", "Parameter")
        .field(FieldDef::string("name").max_length(50).pattern(r"^\w+$"))
        .field(FieldDef::string("type").choices(PARAMETER_TYPES))
        .field(FieldDef::string("description").default_value(json!("")))
        .field(FieldDef::boolean("is_secret"))
        .field(FieldDef::boolean("required"))
        .field(FieldDef::reference("python_module", PYTHON_MODULE))
}

fn plugin_value() -> EntityType {
    EntityType::new("api_app", "PluginConfig")
        .field(FieldDef::json("value"))
        .field(FieldDef::boolean("for_organization").default_value(json!(false)))
        .field(FieldDef::timestamp("updated_at").nullable())
        .field(FieldDef::reference("owner", USER).nullable())
        .field(FieldDef::reference("parameter", PARAMETER))
        .field(FieldDef::reference("analyzer_config", ANALYZER_CONFIG).nullable())
        .field(FieldDef::reference("connector_config", CONNECTOR_CONFIG).nullable())
        .field(FieldDef::reference("visualizer_config", VISUALIZER_CONFIG).nullable())
        .field(FieldDef::reference("ingestor_config", INGESTOR_CONFIG).nullable())
        .field(FieldDef::reference("pivot_config", PIVOT_CONFIG).nullable())
}

/// The plugin-configuration schema.
pub fn schema() -> Result<Schema, SchemaError> {
    Schema::new([
        python_module(),
        parameter(),
        plugin_value(),
        EntityType::new("api_app", "Organization")
            .keyed_by("name")
            .field(FieldDef::string("name").max_length(100)),
        EntityType::new("auth", "User")
            .keyed_by("username")
            .field(FieldDef::string("username").max_length(150)),
        EntityType::new("django_celery_beat", "PeriodicTask")
            .keyed_by("name")
            .field(FieldDef::string("name").max_length(200)),
        analyzer_config(),
        plugin_config("connectors_manager", "ConnectorConfig"),
        plugin_config("visualizers_manager", "VisualizerConfig"),
        plugin_config("ingestors_manager", "IngestorConfig"),
        plugin_config("pivots_manager", "PivotConfig"),
    ])
}
