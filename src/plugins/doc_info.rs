//! Seed for the `Doc_Info` file analyzer.
//!
//! Static analysis of Microsoft Office documents (oletools), with one list
//! parameter holding extra passwords to try on encrypted documents.

use serde_json::json;

use crate::error::SeedResult;
use crate::migration::{MigrationId, SeedGroup, SeedMigration, SeedSet};
use crate::shape::Shape;

use super::{ANALYZER_CONFIG, PARAMETER, PLUGIN_CONFIG};

/// Natural key of the seeded analyzer.
pub const NAME: &str = "Doc_Info";

fn python_module() -> serde_json::Value {
    json!({
        "module": "doc_info.DocInfo",
        "base_path": "api_app.analyzers_manager.file_analyzers",
    })
}

fn passwords_parameter() -> serde_json::Value {
    json!({
        "python_module": python_module(),
        "name": "additional_passwords_to_check",
        "type": "list",
        "description": "List of passwords to try when decrypting the document",
        "is_secret": false,
        "required": false,
    })
}

fn analyzer() -> serde_json::Value {
    json!({
        "name": NAME,
        "python_module": python_module(),
        "description": "static Microsoft Office document analysis ([Oletools](https://github.com/decalage2/oletools)) with features to analyze XLM macros, encrypted macros and much more",
        "disabled": false,
        "soft_time_limit": 30,
        "routing_key": "local",
        "health_check_status": true,
        "type": "file",
        "docker_based": false,
        "maximum_tlp": "RED",
        "observable_supported": [],
        "supported_filetypes": [
            "application/msword",
            "application/vnd.ms-office",
            "application/vnd.ms-excel.addin.macroEnabled",
            "application/x-mspublisher",
            "application/vnd.ms-powerpoint",
            "application/vnd.ms-excel",
            "application/vnd.ms-excel.sheet.macroEnabled.12",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/onenote",
            "text/x-ms-iqy",
            "application/excel",
            "text/xml",
            "application/xml",
            "application/zip",
            "application/encrypted",
            "text/plain",
            "text/csv",
        ],
        "run_hash": false,
        "run_hash_type": "",
        "not_supported_filetypes": [],
        "health_check_task": null,
        "disabled_in_organizations": [],
    })
}

fn default_value() -> serde_json::Value {
    json!({
        "parameter": passwords_parameter(),
        "for_organization": false,
        "value": [""],
        "updated_at": "2024-02-09T10:52:17.025535Z",
        "owner": null,
        "analyzer_config": NAME,
        "connector_config": null,
        "visualizer_config": null,
        "ingestor_config": null,
        "pivot_config": null,
    })
}

/// The analyzer, its parameter and the parameter's default value.
pub fn seed_set() -> SeedResult<SeedSet> {
    Ok(SeedSet::new(ANALYZER_CONFIG, "name", Shape::from_json(analyzer())?)
        .with_dependents(SeedGroup::new(
            PARAMETER,
            vec![Shape::from_json(passwords_parameter())?],
        ))
        .with_dependents(SeedGroup::new(
            PLUGIN_CONFIG,
            vec![Shape::from_json(default_value())?],
        )))
}

/// The migration step, ordered after the initial `api_app` schema and the
/// previous analyzer seed.
pub fn migration() -> SeedResult<SeedMigration> {
    Ok(SeedMigration::new(
        MigrationId::new("analyzers_manager", "0002_0035_analyzer_config_doc_info"),
        vec![
            MigrationId::new("api_app", "0001_2_initial_squashed"),
            MigrationId::new(
                "analyzers_manager",
                "0002_0034_analyzer_config_docguard_upload_file",
            ),
        ],
        seed_set()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::value::Value;

    #[test]
    fn seed_set_shapes() {
        let seed = seed_set().unwrap();
        assert_eq!(seed.entity, ANALYZER_CONFIG);
        assert_eq!(seed.name(), Some(&Value::from(NAME)));
        assert_eq!(seed.dependents.len(), 2);
        assert_eq!(seed.dependents[0].entity, PARAMETER);
        assert_eq!(seed.dependents[1].entity, PLUGIN_CONFIG);

        let filetypes = seed.primary.get("supported_filetypes").unwrap();
        assert_eq!(filetypes.as_list().unwrap().len(), 19);
        assert!(seed.primary.get("python_module").unwrap().is_shape());
        // The entity label never travels inside the shape.
        assert!(seed.primary.get("model").is_none());
    }

    #[test]
    fn migration_declares_order_and_is_not_atomic() {
        use crate::migration::Migration;

        let m = migration().unwrap();
        assert_eq!(
            m.id().to_string(),
            "analyzers_manager.0002_0035_analyzer_config_doc_info"
        );
        let deps: Vec<_> = m.dependencies().iter().map(ToString::to_string).collect();
        assert_eq!(
            deps,
            vec![
                "api_app.0001_2_initial_squashed",
                "analyzers_manager.0002_0034_analyzer_config_docguard_upload_file",
            ]
        );
        assert!(!m.atomic());
    }
}
