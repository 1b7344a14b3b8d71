use oauth2_core::OAuth2Error;
use oauth2_fields::FieldType;

/// One serialized-object column of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub db_type: &'static str,
}

/// Record schema: the table/collection and the columns the adapter may touch.
///
/// Every model gets an implicit auto-increment `id` column; it is what
/// "first matching record" is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelClass {
    pub table: String,
    pub key_columns: Vec<String>,
    pub fields: Vec<FieldDef>,
}

impl ModelClass {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_columns: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.key_columns.push(name.into());
        self
    }

    pub fn with_field<F: FieldType>(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            db_type: F::db_type(),
        });
        self
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.key_columns.iter().any(|k| k == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Reject column names the model does not declare.
    ///
    /// Record stores call this before building a query, so identifiers that reach
    /// SQL are always ones the caller declared up front.
    pub fn check_columns(&self, key_name: &str, property_name: &str) -> Result<(), OAuth2Error> {
        if !self.has_key(key_name) {
            return Err(OAuth2Error::invalid_request(&format!(
                "unknown column `{key_name}` on model `{}`",
                self.table
            )));
        }
        if !self.has_field(property_name) {
            return Err(OAuth2Error::invalid_request(&format!(
                "unknown column `{property_name}` on model `{}`",
                self.table
            )));
        }
        Ok(())
    }
}
