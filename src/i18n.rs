/*
Message catalogue for user-facing API errors and notices.

- Translations for PT/EN are embedded as JSON and parsed once.
- `tr` looks up a key for an explicit language with optional `{name}` params.
- `t` / `t_with` use the default language (DEFAULT_LANG).

Usage:
    let msg = i18n::t("not_found.link");
    let msg = i18n::t_with("reminder.cooldown", &[("hours", "12")]);

Default language is `pt`. Keys missing for the requested language fall back
to the default language, then to the key itself.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "pt";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const PT_JSON: &str = r#"
{
  "bad_request.token_required": "Token de compartilhamento obrigatório",
  "bad_request.empty_body": "O corpo da requisição está vazio",
  "not_found.link": "Link não encontrado ou expirado",
  "not_found.artwork": "Arte não encontrada",
  "not_found.project": "Projeto não encontrado",
  "not_found.version": "Versão não encontrada",
  "not_found.feedback": "Feedback não encontrado",
  "not_found.approval": "Solicitação de aprovação não encontrada",
  "not_found.user": "Usuário não encontrado",
  "not_found.shared_link": "Compartilhamento não encontrado",
  "forbidden.link_expired": "Este link expirou",
  "forbidden.link_scope": "Este link não dá acesso a esta arte",
  "forbidden.no_comment": "Este link não permite comentários",
  "forbidden.no_download": "Este link não permite download",
  "forbidden.not_owner": "Você não é o dono deste recurso",
  "forbidden.not_approver": "Apenas o aprovador designado pode decidir",
  "conflict.artwork_closed": "Esta arte não aceita mais feedbacks",
  "conflict.artwork_already_closed": "Esta arte já está fechada",
  "conflict.email_taken": "Este e-mail já está cadastrado",
  "conflict.approval_decided": "Esta aprovação já foi decidida",
  "validation.content_empty": "O conteúdo não pode ser vazio",
  "validation.content_too_long": "O conteúdo não pode exceder {max} caracteres",
  "validation.audio_attachment": "Feedback de áudio requer um anexo válido",
  "validation.email": "E-mail inválido",
  "validation.password_short": "A senha deve ter pelo menos {min} caracteres",
  "validation.name_empty": "O nome não pode ser vazio",
  "validation.kind": "Tipo inválido: {kind}",
  "validation.status": "Status inválido: {status}",
  "validation.expires_in": "A validade deve ser maior que zero",
  "validation.cooldown": "O intervalo entre lembretes não pode ser negativo",
  "validation.approval_id": "approval_id é obrigatório",
  "validation.recipient_id": "recipient_id é obrigatório",
  "validation.recipient_mismatch": "O destinatário não é o aprovador desta solicitação",
  "validation.file_path": "Caminho do arquivo inválido",
  "validation.text_empty": "O texto não pode ser vazio",
  "reminder.cooldown": "Um lembrete já foi enviado recentemente. Tente novamente em {hours}h",
  "reminder.not_pending": "Esta aprovação não está mais pendente",
  "reminder.sent": "Lembrete enviado",
  "auth.logged_out": "Sessão encerrada",
  "artwork.closed": "Arte fechada para feedback",
  "unavailable.public_url": "PUBLIC_APP_URL não configurada",
  "unavailable.storage": "Armazenamento de arquivos não configurado",
  "not_configured.speech": "API de voz não configurada (SPEECH_API_KEY)",
  "upstream.speech": "A API de voz respondeu com erro: {status}"
}
"#;

const EN_JSON: &str = r#"
{
  "bad_request.token_required": "Share token is required",
  "bad_request.empty_body": "Request body is empty",
  "not_found.link": "Link not found or expired",
  "not_found.artwork": "Artwork not found",
  "not_found.project": "Project not found",
  "not_found.version": "Version not found",
  "not_found.feedback": "Feedback not found",
  "not_found.approval": "Approval request not found",
  "not_found.user": "User not found",
  "not_found.shared_link": "Shared link not found",
  "forbidden.link_expired": "This link has expired",
  "forbidden.link_scope": "This link does not grant access to this artwork",
  "forbidden.no_comment": "This link does not allow comments",
  "forbidden.no_download": "This link does not allow downloads",
  "forbidden.not_owner": "You do not own this resource",
  "forbidden.not_approver": "Only the designated approver can decide",
  "conflict.artwork_closed": "This artwork no longer accepts feedback",
  "conflict.artwork_already_closed": "This artwork is already closed",
  "conflict.email_taken": "This email is already registered",
  "conflict.approval_decided": "This approval has already been decided",
  "validation.content_empty": "Content cannot be empty",
  "validation.content_too_long": "Content cannot exceed {max} characters",
  "validation.audio_attachment": "Audio feedback requires a valid attachment",
  "validation.email": "Invalid email",
  "validation.password_short": "Password must be at least {min} characters",
  "validation.name_empty": "Name cannot be empty",
  "validation.kind": "Invalid kind: {kind}",
  "validation.status": "Invalid status: {status}",
  "validation.expires_in": "Expiry must be greater than zero",
  "validation.cooldown": "Reminder cooldown cannot be negative",
  "validation.approval_id": "approval_id is required",
  "validation.recipient_id": "recipient_id is required",
  "validation.recipient_mismatch": "Recipient is not the approver of this request",
  "validation.file_path": "Invalid file path",
  "validation.text_empty": "Text cannot be empty",
  "reminder.cooldown": "A reminder was sent recently. Try again in {hours}h",
  "reminder.not_pending": "This approval is no longer pending",
  "reminder.sent": "Reminder sent",
  "auth.logged_out": "Logged out",
  "artwork.closed": "Artwork closed for feedback",
  "unavailable.public_url": "PUBLIC_APP_URL is not configured",
  "unavailable.storage": "File storage is not configured",
  "not_configured.speech": "Speech API is not configured (SPEECH_API_KEY)",
  "upstream.speech": "Speech API responded with an error: {status}"
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    let pt_map: HashMap<String, String> = serde_json::from_str(PT_JSON).unwrap_or_else(|e| {
        panic!("failed to parse PT_JSON in i18n module: {}", e);
    });
    out.insert("pt".to_string(), pt_map);

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Translate a key using an explicit language (or default if None).
///
/// - `lang`: optional language code (`"pt"`, `"en"`). If None, DEFAULT_LANG is used.
/// - `key`: translation key (flat string, e.g. "not_found.link").
/// - `params`: optional slice of (name, value) for placeholder replacement.
///   Replacements use single-brace placeholders `{name}`.
///
/// Returns the translated and parameter-substituted string. If no translation is found,
/// returns a sensible fallback (default language value or the key itself).
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    // Try requested language
    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        // Fallback to default language
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        // If still missing, return the key itself (useful in logs)
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Convenience wrapper with params (default language).
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr_basic() {
        let s = tr(Some("en"), "not_found.link", None);
        assert_eq!(s, "Link not found or expired");
    }

    #[test]
    fn test_t_with_params() {
        let s = t_with("reminder.cooldown", &[("hours", "12")]);
        assert!(s.contains("12h"));
        assert!(!s.contains("{hours}"));
    }

    #[test]
    fn test_fallback_to_default() {
        // Unknown language falls back to default (pt)
        let s = tr(Some("fr"), "not_found.link", None);
        assert_eq!(s, t("not_found.link"));
    }

    #[test]
    fn missing_key_returns_key() {
        let k = "non.existent.key";
        let s = t(k);
        assert_eq!(s, k.to_string());
    }

    #[test]
    fn catalogues_have_the_same_keys() {
        let map = translations();
        let pt = map.get("pt").unwrap();
        let en = map.get("en").unwrap();
        for key in pt.keys() {
            assert!(en.contains_key(key), "missing en translation for {}", key);
        }
        assert_eq!(pt.len(), en.len());
    }
}
