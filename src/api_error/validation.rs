//! # 字段校验错误
//!
//! 校验引擎产出的每条违规都带有点分命名空间（如 `User.Address.City`）、
//! 规则名（如 `required`）和可选参数（如 `min=18` 中的 `18`）。
//! 这里把一组违规整理成 `字段名 → 信息` 的映射返回给客户端。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 单个字段的规则违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    namespace: String,
    field: String,
    tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    param: Option<String>,
}

impl FieldViolation {
    /// 由命名空间和规则名创建，字段名取命名空间最后一段
    pub fn new(namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let field = leaf(&namespace).to_string();
        Self {
            namespace,
            field,
            tag: tag.into(),
            param: None,
        }
    }

    /// 附带规则参数
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// 完整命名空间，例如 `User.Address.City`
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 字段名（命名空间最后一段）
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// 失败的规则名
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// 规则参数，例如 `min=18` 中的 `18`
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error:Field validation for '{}' failed on the '{}' tag",
            self.namespace, self.field, self.tag
        )
    }
}

/// 一次校验产生的全部违规，按发现顺序排列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    /// 空集合
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条违规
    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    /// 链式追加
    #[must_use]
    pub fn with(mut self, violation: FieldViolation) -> Self {
        self.push(violation);
        self
    }

    /// 是否没有违规
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// 违规条数
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// 按发现顺序遍历
    pub fn iter(&self) -> std::slice::Iter<'_, FieldViolation> {
        self.violations.iter()
    }

    /// 没有违规时返回 `Ok(())`
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl FromIterator<FieldViolation> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = FieldViolation>>(iter: I) -> Self {
        Self {
            violations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldViolation;
    type IntoIter = std::slice::Iter<'a, FieldViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

/// 校验信息翻译器
///
/// 批量接口：输入整组违规，输出 `命名空间 → 已翻译信息`。
pub trait Translator: Send + Sync {
    /// 返回 `命名空间 → 信息`，缺失的命名空间不出现在结果中
    fn translate(&self, errors: &ValidationErrors) -> HashMap<String, String>;
}

impl<F> Translator for F
where
    F: Fn(&ValidationErrors) -> HashMap<String, String> + Send + Sync,
{
    fn translate(&self, errors: &ValidationErrors) -> HashMap<String, String> {
        self(errors)
    }
}

/// 内置英文翻译器
///
/// 模板中的 `{field}` 和 `{param}` 会被替换；未登记的规则使用通用模板。
#[derive(Debug, Clone)]
pub struct EnglishTranslator {
    templates: HashMap<String, String>,
}

impl Default for EnglishTranslator {
    fn default() -> Self {
        let templates = [
            ("required", "{field} is a required field"),
            ("email", "{field} must be a valid email address"),
            ("url", "{field} must be a valid URL"),
            ("uuid", "{field} must be a valid UUID"),
            ("min", "{field} must be at least {param}"),
            ("max", "{field} must be at most {param}"),
            ("len", "{field} must be {param} in length"),
            ("gt", "{field} must be greater than {param}"),
            ("gte", "{field} must be {param} or greater"),
            ("lt", "{field} must be less than {param}"),
            ("lte", "{field} must be {param} or less"),
            ("oneof", "{field} must be one of [{param}]"),
            ("eqfield", "{field} must be equal to {param}"),
        ]
        .into_iter()
        .map(|(tag, template)| (tag.to_string(), template.to_string()))
        .collect();

        Self { templates }
    }
}

impl EnglishTranslator {
    /// 使用内置模板
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记或覆盖某条规则的模板
    #[must_use]
    pub fn with_template(mut self, tag: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(tag.into(), template.into());
        self
    }

    fn render(&self, violation: &FieldViolation) -> String {
        match self.templates.get(violation.tag()) {
            Some(template) => template
                .replace("{field}", violation.field())
                .replace("{param}", violation.param().unwrap_or_default()),
            None => format!(
                "{} failed on the '{}' rule",
                violation.field(),
                violation.tag()
            ),
        }
    }
}

impl Translator for EnglishTranslator {
    fn translate(&self, errors: &ValidationErrors) -> HashMap<String, String> {
        errors
            .iter()
            .map(|violation| (violation.namespace().to_string(), self.render(violation)))
            .collect()
    }
}

/// 整理为 `小写字段名 → 信息`
///
/// 有翻译器时使用翻译结果，按命名空间最后一段重新归键；否则直接使用规则名。
/// 同一字段出现多次时保留最后一条。不同父结构下同名的嵌套字段会互相覆盖。
#[must_use]
pub fn format_validation_errors(
    errors: &ValidationErrors,
    translator: Option<&dyn Translator>,
) -> BTreeMap<String, String> {
    let mut formatted = BTreeMap::new();

    if let Some(translator) = translator {
        let translated = translator.translate(errors);
        for violation in errors {
            if let Some(message) = translated.get(violation.namespace()) {
                formatted.insert(leaf(violation.namespace()).to_lowercase(), message.clone());
            }
        }
    } else {
        for violation in errors {
            formatted.insert(violation.field().to_lowercase(), violation.tag().to_string());
        }
    }

    formatted
}

fn leaf(namespace: &str) -> &str {
    namespace.rsplit('.').next().unwrap_or(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ValidationErrors {
        ValidationErrors::new()
            .with(FieldViolation::new("User.Email", "email"))
            .with(FieldViolation::new("User.Age", "min").with_param("18"))
    }

    #[test]
    fn test_field_is_namespace_leaf() {
        let violation = FieldViolation::new("Person.Address.City", "required");
        assert_eq!(violation.field(), "City");
        assert_eq!(violation.namespace(), "Person.Address.City");
        assert_eq!(FieldViolation::new("Name", "required").field(), "Name");
    }

    #[test]
    fn test_raw_tags_without_translator() {
        let formatted = format_validation_errors(&sample(), None);
        assert_eq!(formatted["email"], "email");
        assert_eq!(formatted["age"], "min");
    }

    #[test]
    fn test_english_translator() {
        let translator = EnglishTranslator::new();
        let formatted = format_validation_errors(&sample(), Some(&translator));

        assert_eq!(formatted["email"], "Email must be a valid email address");
        assert_eq!(formatted["age"], "Age must be at least 18");
    }

    #[test]
    fn test_custom_template_and_fallback() {
        let translator = EnglishTranslator::new().with_template("email", "{field} looks wrong");
        let errors = ValidationErrors::new()
            .with(FieldViolation::new("Signup.Email", "email"))
            .with(FieldViolation::new("Signup.Code", "luhn"));

        let formatted = format_validation_errors(&errors, Some(&translator));
        assert_eq!(formatted["email"], "Email looks wrong");
        assert_eq!(formatted["code"], "Code failed on the 'luhn' rule");
    }

    #[test]
    fn test_closure_translator_rekeys_by_leaf() {
        let translator = |errors: &ValidationErrors| {
            errors
                .iter()
                .map(|v| (v.namespace().to_string(), format!("bad {}", v.tag())))
                .collect::<HashMap<_, _>>()
        };
        let errors: ValidationErrors =
            std::iter::once(FieldViolation::new("Order.Shipping.ZipCode", "len")).collect();

        let formatted = format_validation_errors(&errors, Some(&translator));
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted["zipcode"], "bad len");
    }

    #[test]
    fn test_last_violation_per_field_wins() {
        let errors = ValidationErrors::new()
            .with(FieldViolation::new("A.Name", "required"))
            .with(FieldViolation::new("B.Name", "max"));

        let formatted = format_validation_errors(&errors, None);
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted["name"], "max");
    }

    #[test]
    fn test_display_and_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let err = sample().into_result().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Key: 'User.Email' Error:Field validation for 'Email' failed on the 'email' tag"));
        assert_eq!(text.lines().count(), 2);
    }
}
