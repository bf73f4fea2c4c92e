//! Localized strings for bot responses.
//!
//! `t(key, lang)` returns the template for `key`, `tf` additionally fills
//! `{name}` placeholders. A missing translation falls back to the default
//! language, then to the other language, and finally to the key itself.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Display language chosen by a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Zh => "zh",
            Lang::En => "en",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = String;

    /// Accepts `zh`, `en` and region-tagged forms such as `en-US`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s.trim().split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "zh" => Ok(Lang::Zh),
            "en" => Ok(Lang::En),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

struct Bundle {
    zh: &'static str,
    en: &'static str,
}

impl Bundle {
    fn get(&self, lang: Lang) -> Option<&'static str> {
        let s = match lang {
            Lang::Zh => self.zh,
            Lang::En => self.en,
        };
        (!s.is_empty()).then_some(s)
    }
}

static MESSAGES: Lazy<HashMap<&'static str, Bundle>> = Lazy::new(|| {
    let entries: &[(&'static str, &'static str, &'static str)] = &[
        ("must_use_in_server", "此命令必须在服务器内使用。", "This command must be used in a server."),
        ("use_channel", "请在 #{channel} 中使用该命令。", "Please use this command in #{channel}."),
        ("api_not_config", "认证 API 未配置。", "Auth API base is not configured."),
        ("already_verified", "你已通过验证，无需重复认证。", "You are already verified."),
        ("auth_failed_500", "账号或密码错误。", "Incorrect username or password."),
        ("auth_failed_generic", "认证失败，请稍后再试。", "Authentication failed. Please try again later."),
        (
            "auth_success",
            "✅ 已以 {username} 身份通过验证，已授予角色并更新昵称。",
            "✅ Authenticated as {username}. Role granted and nickname updated.",
        ),
        ("setup_complete", "初始化完成。角色：{role}，频道：{channel}", "Setup complete. Role: {role}, Channel: {channel}"),
        ("setup_warnings", "部分频道权限未能更新：{channels}", "Some channel permissions could not be updated: {channels}"),
        ("lang_prompt", "请选择显示语言 / Choose your language", "请选择显示语言 / Choose your language"),
        ("lang_set_zh", "已切换为中文显示。", "Switched to Chinese."),
        ("lang_set_en", "已切换为英文显示。", "Switched to English."),
        ("missing_admin", "需要管理员权限才能使用此命令。", "You need Administrator permission to use this command."),
        ("guild_not_found", "找不到服务器。", "Guild not found"),
        ("role_create_failed", "无法创建/找到角色。", "Failed to create/find role"),
        (
            "role_permission_denied",
            "缺少分配角色的权限。请将我的角色提升到更高位置。",
            "Missing permission to assign roles. Move my role higher.",
        ),
        ("role_assign_failed", "分配角色失败：{error}", "Failed to assign role: {error}"),
        ("modal_title", "账号登录", "Account Login"),
        ("modal_login_label", "登录名（用户名/邮箱）", "Login (username/email)"),
        ("modal_login_placeholder", "你的用户名或邮箱", "your name or email"),
        ("modal_password_label", "密码", "Password"),
        ("modal_timeout", "登录窗口已超时，请重新使用该命令。", "The login form timed out. Please run the command again."),
        ("auth_request_failed", "认证请求失败：{error}", "Auth request failed: {error}"),
        ("auth_partial_success", "已验证为 {username}，但是：{error}", "Authenticated as {username}, but: {error}"),
        ("record_not_saved", "验证记录未能保存，请联系管理员。", "the verification record could not be saved, please contact an admin."),
        ("revoke_success", "已撤销 {member} 的验证。", "Revoked verification for {member}."),
        ("revoke_role_removed", " 已移除角色。", " Removed role."),
        ("revoke_record_cleared", " 已清除记录。", " Cleared record."),
        ("info_none", "{member} 没有验证记录。", "{member} has no verification record."),
        (
            "info_record",
            "{member} 已以 {username} 身份验证于 {verified_at}。",
            "{member} verified as {username} at {verified_at}.",
        ),
        ("list_empty", "本服务器暂无已验证成员。", "No verified members in this server."),
        ("list_header", "已验证成员（{count}）：", "Verified members ({count}):"),
        ("generic_error", "运行此命令时发生错误。", "An error occurred while running this command."),
        ("echo_empty", "请提供要回显的文本。", "Please provide text to echo."),
        (
            "help_text",
            "可用命令：\n- /basic ping：检查机器人\n- /basic echo <文本>：回显文本\n- /auth login：登录验证\n- /auth setup：初始化（管理员）\n- /auth revoke <成员>：撤销验证（管理员）\n- /auth info <成员>、/auth list：查看记录（管理员）",
            "Available commands:\n- /basic ping: check bot\n- /basic echo <text>: echo back text\n- /auth login: authenticate\n- /auth setup: create role & channel (admin)\n- /auth revoke <member>: revoke verification (admin)\n- /auth info <member>, /auth list: inspect records (admin)",
        ),
    ];
    entries
        .iter()
        .map(|&(key, zh, en)| (key, Bundle { zh, en }))
        .collect()
});

/// Return the template for `key` in `lang`.
pub fn t(key: &str, lang: Lang) -> String {
    let Some(bundle) = MESSAGES.get(key) else {
        return key.to_string();
    };
    bundle
        .get(lang)
        .or_else(|| bundle.get(Lang::default()))
        .or_else(|| bundle.get(Lang::En))
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}

/// Return the template for `key` with `{name}` placeholders replaced.
///
/// Substitution is a single pass over the template, so values containing
/// braces are inserted verbatim.
pub fn tf(key: &str, lang: Lang, args: &[(&str, &str)]) -> String {
    let template = t(key, lang);
    let mut text = String::with_capacity(template.len());
    let mut rest = template.as_str();
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            args.iter()
                .find(|(arg, _)| *arg == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                text.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}
