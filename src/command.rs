//! Command descriptors.
//!
//! A descriptor captures everything needed to execute one command: the mode
//! (literal text or stored procedure), the SQL text or procedure name, and
//! the typed parameter list with directions. Descriptors are built once per
//! run and read-only afterwards.

use crate::error::{QuerykitError, Result};
use crate::row::Value;

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    /// Literal SQL with placeholders.
    Text,
    /// Name of a server-side (or registered) procedure.
    StoredProcedure,
}

/// Parameter direction.
///
/// Stored-procedure commands must declare every direction explicitly, even
/// when only the input drives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
    ReturnValue,
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Money,
    Text,
}

impl ParamType {
    /// Whether a bound value matches the declared type.
    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ParamType::Integer, Value::Int(_))
                | (ParamType::Money, Value::Float(_))
                | (ParamType::Money, Value::Int(_))
                | (ParamType::Text, Value::Text(_))
        )
    }
}

/// A typed command parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub direction: ParamDirection,
    pub ty: ParamType,
    pub value: Option<Value>,
}

impl Param {
    pub fn input(name: &str, ty: ParamType, value: Value) -> Self {
        Self {
            name: name.to_string(),
            direction: ParamDirection::Input,
            ty,
            value: Some(value),
        }
    }

    pub fn output(name: &str, ty: ParamType) -> Self {
        Self {
            name: name.to_string(),
            direction: ParamDirection::Output,
            ty,
            value: None,
        }
    }

    pub fn return_value(name: &str, ty: ParamType) -> Self {
        Self {
            name: name.to_string(),
            direction: ParamDirection::ReturnValue,
            ty,
            value: None,
        }
    }
}

/// An immutable description of a command to execute.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub mode: CommandMode,
    pub text: String,
    pub params: Vec<Param>,
}

/// SQL text of the minimum-price product query; `{}` is replaced with the
/// backend's placeholder syntax at execution time.
const PRODUCTS_OVER_SQL: &str = "SELECT product_id, product_name, unit_price \
                                 FROM products \
                                 WHERE unit_price >= {}";

/// Registered procedure answering the same question.
pub const PRODUCTS_OVER_PROC: &str = "get_products_over";

impl CommandDescriptor {
    /// Text-mode product query with one minimum-price placeholder.
    pub fn products_over(minimum_price: f64) -> Self {
        Self {
            mode: CommandMode::Text,
            text: PRODUCTS_OVER_SQL.to_string(),
            params: vec![Param::input(
                "minimumPrice",
                ParamType::Money,
                Value::Float(minimum_price),
            )],
        }
    }

    /// Stored-procedure-mode product query.
    ///
    /// Declares all three parameters the procedure interface requires: the
    /// price input, the count output, and the return-value slot.
    pub fn products_over_proc(minimum_price: f64) -> Self {
        Self {
            mode: CommandMode::StoredProcedure,
            text: PRODUCTS_OVER_PROC.to_string(),
            params: vec![
                Param::input("price", ParamType::Money, Value::Float(minimum_price)),
                Param::output("count", ParamType::Integer),
                Param::return_value("rv", ParamType::Integer),
            ],
        }
    }

    /// Text-mode supplier listing for one country.
    pub fn suppliers_in(country: &str) -> Self {
        Self {
            mode: CommandMode::Text,
            text: "SELECT supplier_id, company_name, city, country \
                   FROM suppliers \
                   WHERE country = {}"
                .to_string(),
            params: vec![Param::input(
                "country",
                ParamType::Text,
                Value::Text(country.to_string()),
            )],
        }
    }

    /// Input parameter values, in declaration order.
    pub fn input_values(&self) -> Vec<Value> {
        self.params
            .iter()
            .filter(|p| p.direction == ParamDirection::Input)
            .filter_map(|p| p.value.clone())
            .collect()
    }

    /// Render the command text with backend placeholder syntax.
    ///
    /// `prefix` is `"$"` for PostgreSQL, `"?"` for SQLite; placeholders are
    /// numbered from 1 in input-parameter order.
    pub fn render_text(&self, prefix: &str) -> String {
        let mut rendered = String::with_capacity(self.text.len());
        let mut index = 0usize;
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find("{}") {
            index += 1;
            rendered.push_str(&rest[..pos]);
            rendered.push_str(prefix);
            rendered.push_str(&index.to_string());
            rest = &rest[pos + 2..];
        }
        rendered.push_str(rest);
        rendered
    }

    /// Check the descriptor before execution.
    ///
    /// Text mode allows input parameters only. Stored-procedure mode must
    /// declare exactly the input/output/return-value triple.
    pub fn validate(&self) -> Result<()> {
        for param in &self.params {
            if param.direction == ParamDirection::Input {
                match &param.value {
                    Some(value) if param.ty.accepts(value) => {}
                    Some(value) => {
                        return Err(QuerykitError::Validation(format!(
                            "parameter {} declared {:?} but bound {:?}",
                            param.name, param.ty, value
                        )))
                    }
                    None => {
                        return Err(QuerykitError::Validation(format!(
                            "input parameter {} has no value",
                            param.name
                        )))
                    }
                }
            }
        }

        match self.mode {
            CommandMode::Text => {
                if self
                    .params
                    .iter()
                    .any(|p| p.direction != ParamDirection::Input)
                {
                    return Err(QuerykitError::Validation(
                        "text commands accept input parameters only".to_string(),
                    ));
                }
                let placeholders = self.text.matches("{}").count();
                if placeholders != self.params.len() {
                    return Err(QuerykitError::Validation(format!(
                        "command declares {} placeholders but {} parameters",
                        placeholders,
                        self.params.len()
                    )));
                }
                Ok(())
            }
            CommandMode::StoredProcedure => {
                let inputs = self
                    .params
                    .iter()
                    .filter(|p| p.direction == ParamDirection::Input)
                    .count();
                let outputs = self
                    .params
                    .iter()
                    .filter(|p| p.direction == ParamDirection::Output)
                    .count();
                let returns = self
                    .params
                    .iter()
                    .filter(|p| p.direction == ParamDirection::ReturnValue)
                    .count();

                if inputs != 1 || outputs != 1 || returns != 1 {
                    return Err(QuerykitError::Validation(
                        "stored procedure commands must declare the input, output and \
                         return-value parameters"
                            .to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
