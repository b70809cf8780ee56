//! Catalog endpoint

use std::collections::BTreeMap;

use axum::extract::State;
use serde::Serialize;

use super::state::AppState;
use super::types::Json;
use crate::domain::catalog::SchemaCatalog;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// `{table: [{name, type}]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaView(pub BTreeMap<String, Vec<ColumnView>>);

impl From<&SchemaCatalog> for SchemaView {
    fn from(catalog: &SchemaCatalog) -> Self {
        Self(
            catalog
                .tables
                .iter()
                .map(|table| {
                    let columns = table
                        .columns
                        .iter()
                        .map(|c| ColumnView {
                            name: c.name.clone(),
                            data_type: c.data_type.clone(),
                        })
                        .collect();
                    (table.name.clone(), columns)
                })
                .collect(),
        )
    }
}

/// GET /api/schema
pub async fn get_schema(State(state): State<AppState>) -> Json<SchemaView> {
    Json(SchemaView::from(state.orchestrator.catalog()))
}
