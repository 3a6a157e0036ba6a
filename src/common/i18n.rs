// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::LazyLock;

pub const DEFAULT_LANG: &str = "en";

// Catálogos embutidos no binário
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("locales/en.json")),
    ("pt", include_str!("locales/pt.json")),
    ("es", include_str!("locales/es.json")),
];

static EMBEDDED: LazyLock<I18nStore> = LazyLock::new(|| {
    I18nStore::from_catalogs(CATALOGS).unwrap_or_else(|e| {
        tracing::error!("🔥 Catálogo de mensagens inválido: {}", e);
        I18nStore::default()
    })
});

/// Mensagens traduzidas, indexadas por idioma e chave.
#[derive(Debug, Default, Clone)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn from_catalogs(catalogs: &[(&str, &str)]) -> anyhow::Result<Self> {
        let mut messages = HashMap::new();
        for (lang, raw) in catalogs {
            let catalog: HashMap<String, String> = serde_json::from_str(raw)?;
            messages.insert(lang.to_string(), catalog);
        }
        Ok(Self { messages })
    }

    pub fn embedded() -> &'static I18nStore {
        &EMBEDDED
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        self.messages.keys().map(String::as_str).collect()
    }

    /// Traduz `key` para `lang`, caindo para o inglês e, por último, para a própria chave.
    pub fn translate(&self, lang: &str, key: &str, args: &[String]) -> String {
        let template = self
            .messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .or_else(|| self.messages.get(DEFAULT_LANG).and_then(|c| c.get(key)));

        match template {
            Some(template) => fill(template, args),
            None => key.to_string(),
        }
    }
}

// Substitui cada "{}" pelo próximo argumento, em ordem.
fn fill(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_has_the_english_keys() {
        let store = I18nStore::embedded();
        let english = &store.messages[DEFAULT_LANG];
        for lang in ["pt", "es"] {
            let catalog = &store.messages[lang];
            for key in english.keys() {
                assert!(catalog.contains_key(key), "{lang} sem a chave {key}");
            }
        }
    }

    #[test]
    fn translate_fills_arguments_in_order() {
        let store = I18nStore::embedded();
        let msg = store.translate(
            "en",
            "workflow.illegal_transition",
            &["DRAFT".to_string(), "COMPLETED".to_string()],
        );
        assert_eq!(msg, "Illegal transition from 'DRAFT' to 'COMPLETED'");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let store = I18nStore::embedded();
        assert_eq!(
            store.translate("de", "auth.unauthenticated", &[]),
            "User not authenticated"
        );
        assert_eq!(store.translate("en", "no.such.key", &[]), "no.such.key");
    }
}
