// src/services/permission.rs
//
// Modelo de permissões (gramática "modulo:recurso:acao:escopo") e o avaliador RBAC.
// Nada aqui faz IO: quem carrega as permissões do usuário é um `PermissionSource`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::AppError;

pub const WILDCARD: &str = "*";
pub const GLOBAL_WILDCARD: &str = "*:*:*:*";
pub const ADMIN_WILDCARD: &str = "ADM:*:*:*";

const SEGMENTS: usize = 4;

/// Código de permissão já validado.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionCode {
    pub module: String,
    pub resource: String,
    pub action: String,
    pub scope: String,
}

impl PermissionCode {
    pub fn segments(&self) -> [&str; SEGMENTS] {
        [&self.module, &self.resource, &self.action, &self.scope]
    }

    pub fn is_wildcard(&self) -> bool {
        self.segments().iter().any(|s| *s == WILDCARD)
    }
}

impl FromStr for PermissionCode {
    type Err = AppError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = code.split(':').collect();
        let valid = parts.len() == SEGMENTS
            && parts.iter().all(|p| {
                !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '*')
            })
            // "*" só vale como segmento inteiro
            && parts.iter().all(|p| *p == WILDCARD || !p.contains('*'));

        if !valid {
            return Err(AppError::InvalidPermissionCode(code.to_string()));
        }

        Ok(Self {
            module: parts[0].to_string(),
            resource: parts[1].to_string(),
            action: parts[2].to_string(),
            scope: parts[3].to_string(),
        })
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.module, self.resource, self.action, self.scope)
    }
}

/// `held` satisfaz `required` quando cada segmento de `held` é "*" ou igual ao de `required`.
pub fn matches(held: &str, required: &str) -> bool {
    if held == required {
        return true;
    }

    let held_parts: Vec<&str> = held.split(':').collect();
    let required_parts: Vec<&str> = required.split(':').collect();
    if held_parts.len() != SEGMENTS || required_parts.len() != SEGMENTS {
        return false;
    }

    held_parts
        .iter()
        .zip(required_parts.iter())
        .all(|(h, r)| *h == WILDCARD || h == r)
}

/// Conjunto efetivo de permissões de um usuário (cargos + diretas, sem repetição).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn is_super_admin(&self) -> bool {
        self.0.contains(GLOBAL_WILDCARD) || self.0.contains(ADMIN_WILDCARD)
    }

    pub fn holds(&self, required: &str) -> bool {
        // Caminho rápido: código idêntico
        if self.0.contains(required) {
            return true;
        }
        self.0.iter().any(|held| matches(held, required))
    }

    /// Códigos exigidos que não são cobertos pelo conjunto. Vazio = autorizado.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        if self.is_super_admin() {
            return Vec::new();
        }
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|code| !self.holds(code))
            .map(str::to_string)
            .collect()
    }

    pub fn authorize<S: AsRef<str>>(&self, required: &[S]) -> bool {
        self.missing(required).is_empty()
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.0.iter().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `authorize(permissões do usuário, permissões exigidas)`.
pub fn authorize<S: AsRef<str>>(held: &PermissionSet, required: &[S]) -> bool {
    held.authorize(required)
}

/// O que o usuário carrega para a decisão: permissões efetivas e códigos de cargo.
#[derive(Debug, Clone, Default)]
pub struct Grants {
    pub permissions: PermissionSet,
    pub roles: HashSet<String>,
}

impl Grants {
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.roles.contains(r.as_ref()))
    }
}

/// De onde vêm as permissões do usuário. Recalculado a cada verificação.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn load_grants(&self, user_id: Uuid) -> Result<Grants, AppError>;
}

/// Guarda de uma operação: `None` = nenhuma exigência declarada (acesso livre).
/// Com exigência, falta de usuário é `Unauthenticated` e falta de permissão é `PermissionDenied`.
pub async fn enforce(
    source: &dyn PermissionSource,
    user_id: Option<Uuid>,
    required: Option<&[&str]>,
) -> Result<Option<Grants>, AppError> {
    let Some(required) = required else {
        return Ok(None);
    };

    let user_id = user_id.ok_or(AppError::Unauthenticated)?;
    let grants = source.load_grants(user_id).await?;

    let missing = grants.permissions.missing(required);
    if !missing.is_empty() {
        tracing::warn!(%user_id, ?missing, "acesso negado");
        return Err(AppError::PermissionDenied(missing));
    }

    Ok(Some(grants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct FixedSource(Vec<&'static str>);

    #[async_trait]
    impl PermissionSource for FixedSource {
        async fn load_grants(&self, _user_id: Uuid) -> Result<Grants, AppError> {
            Ok(Grants {
                permissions: PermissionSet::from_codes(self.0.iter().copied()),
                roles: HashSet::new(),
            })
        }
    }

    #[test]
    fn parses_four_segment_codes() {
        let code: PermissionCode = "MDM:items:read:tenant".parse().unwrap();
        assert_eq!(code.segments(), ["MDM", "items", "read", "tenant"]);
        assert!(!code.is_wildcard());
        assert_eq!(code.to_string(), "MDM:items:read:tenant");

        assert!("ADM:*:*:*".parse::<PermissionCode>().unwrap().is_wildcard());
        assert!("*:*:read:own".parse::<PermissionCode>().is_ok());
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "MDM:items:read", "MDM:items:read:tenant:x", "MDM::read:tenant", "MDM:it*:read:tenant", "MDM:items:read:ten ant"] {
            assert!(bad.parse::<PermissionCode>().is_err(), "{bad} deveria ser inválido");
        }
    }

    #[test]
    fn segments_are_compared_independently() {
        assert!(matches("INV:*:read:tenant", "INV:items:read:tenant"));
        assert!(!matches("INV:*:read:tenant", "INV:items:read:global"));
        assert!(matches("*:*:read:own", "FIN:invoices:read:own"));
        assert!(!matches("*:*:read:own", "FIN:invoices:update:own"));
        // sem dobra de caixa
        assert!(!matches("inv:items:read:tenant", "INV:items:read:tenant"));
        // "*" no segmento casa com outro "*"
        assert!(matches("INV:*:read:tenant", "INV:*:read:tenant"));
        assert!(!matches("INV:items:read:tenant", "INV:*:read:tenant"));
    }

    #[test]
    fn admin_wildcards_grant_everything() {
        let admin = PermissionSet::from_codes(["ADM:*:*:*"]);
        assert!(admin.authorize(&["FIN:invoices:approve:tenant", "INV:stock:update:own"]));

        let root = PermissionSet::from_codes(["*:*:*:*"]);
        assert!(root.authorize(&["ANY:thing:at:all"]));
    }

    #[test]
    fn all_required_codes_must_be_held() {
        let held = PermissionSet::from_codes(["INV:warehouses:read:tenant", "INV:items:read:tenant"]);
        assert!(held.authorize(&["INV:warehouses:read:tenant"]));
        assert_eq!(
            held.missing(&["INV:warehouses:read:tenant", "INV:warehouses:delete:tenant"]),
            vec!["INV:warehouses:delete:tenant".to_string()]
        );
        assert!(held.authorize::<&str>(&[]));
    }

    #[test]
    fn module_admin_wildcard_is_not_global() {
        // só "ADM:*:*:*" é o escape de super-admin; "FIN:*:*:*" vale apenas para FIN
        let held = PermissionSet::from_codes(["FIN:*:*:*"]);
        assert!(held.authorize(&["FIN:payments:approve:department"]));
        assert!(!held.authorize(&["INV:stock:read:tenant"]));
    }

    #[tokio::test]
    async fn enforce_allows_when_nothing_is_declared() {
        let source = FixedSource(vec![]);
        assert!(enforce(&source, None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enforce_requires_a_principal() {
        let source = FixedSource(vec!["*:*:*:*"]);
        let err = enforce(&source, None, Some(&["MDM:status:read:tenant"])).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn enforce_denies_missing_permission() {
        let source = FixedSource(vec!["INV:warehouses:read:tenant"]);
        let err = enforce(&source, Some(Uuid::new_v4()), Some(&["INV:warehouses:delete:tenant"]))
            .await
            .unwrap_err();
        match err {
            AppError::PermissionDenied(missing) => {
                assert_eq!(missing, vec!["INV:warehouses:delete:tenant"])
            }
            other => panic!("esperava PermissionDenied, veio {other:?}"),
        }
    }

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![Just("*".to_string()), "[A-Za-z]{1,6}"]
    }

    fn literal() -> impl Strategy<Value = String> {
        "[A-Za-z]{1,6}"
    }

    proptest! {
        #[test]
        fn global_wildcard_matches_any_code(m in literal(), r in literal(), a in literal(), s in literal()) {
            let required = format!("{m}:{r}:{a}:{s}");
            prop_assert!(matches(GLOBAL_WILDCARD, &required));
        }

        #[test]
        fn match_is_segmentwise(h in proptest::array::uniform4(segment()), r in proptest::array::uniform4(literal())) {
            let held = h.join(":");
            let required = r.join(":");
            let expected = h.iter().zip(r.iter()).all(|(h, r)| h == "*" || h == r);
            prop_assert_eq!(matches(&held, &required), expected);
        }

        #[test]
        fn authorize_is_conjunction(
            held in proptest::collection::vec(proptest::array::uniform4(segment()), 0..5),
            required in proptest::collection::vec(proptest::array::uniform4(literal()), 0..4),
        ) {
            let held: Vec<String> = held.iter().map(|h| h.join(":")).collect();
            let required: Vec<String> = required.iter().map(|r| r.join(":")).collect();
            let set = PermissionSet::from_codes(held.clone());

            let super_admin = held.iter().any(|h| h == GLOBAL_WILDCARD || h == ADMIN_WILDCARD);
            let every = required.iter().all(|r| held.iter().any(|h| matches(h, r)));
            prop_assert_eq!(set.authorize(&required), super_admin || every);
        }
    }
}
