//! 告警消息模板
//!
//! 输出为 Telegram HTML 格式。默认模板分 FIRING / RESOLVED 两段，空段整体省略。
//! 自定义模板使用 minijinja 语法，引用不存在的字段会返回渲染错误。
//! 这也包括 `Labels`/`Annotations` 中不存在的 key，即使写在 `{% if %}` 里；
//! 可选的 key 需要用 `is defined` 判断：
//!
//! ```text
//! {% if a.Annotations.runbook is defined %}{{ a.Annotations.runbook }}{% endif %}
//! ```

use crate::error::{Error, Result};
use crate::model::{Alert, AlertGroup};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const ALERT_NAME_LABEL: &str = "alertname";
const MESSAGE_ANNOTATION: &str = "message";

/// 把告警组渲染成消息文本
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, alert_group: &AlertGroup) -> Result<String>;
}

/// 内置模板
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplateRenderer;

impl TemplateRenderer for DefaultTemplateRenderer {
    fn render(&self, alert_group: &AlertGroup) -> Result<String> {
        let mut out = String::new();
        write_group(&mut out, alert_group)
            .map_err(|e| Error::RenderTemplate(e.to_string()))?;
        Ok(out)
    }
}

fn write_group(out: &mut String, alert_group: &AlertGroup) -> std::fmt::Result {
    let firing = alert_group.firing_alerts();
    if !firing.is_empty() {
        write_section(out, "🚨🚨 FIRING ALERTS 🚨🚨", "💥💥💥", &firing)?;
    }

    let resolved = alert_group.resolved_alerts();
    if !resolved.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        write_section(out, "✅✅ RESOLVED ALERTS ✅✅", "🟢🟢🟢", &resolved)?;
    }

    Ok(())
}

fn write_section(
    out: &mut String,
    header: &str,
    marker: &str,
    alerts: &[&Alert],
) -> std::fmt::Result {
    writeln!(out, "{}", header)?;
    for alert in alerts {
        let title = alert
            .labels
            .get(ALERT_NAME_LABEL)
            .unwrap_or(&alert.name);

        writeln!(out)?;
        writeln!(out, "{} <b>{}</b> {}", marker, escape_html(title), marker)?;
        if let Some(message) = alert.annotations.get(MESSAGE_ANNOTATION) {
            writeln!(out, "  {}", escape_html(message))?;
        }
        write_entries(out, "🔹", &alert.labels, ALERT_NAME_LABEL)?;
        write_entries(out, "🔸", &alert.annotations, MESSAGE_ANNOTATION)?;
    }
    Ok(())
}

fn write_entries(
    out: &mut String,
    bullet: &str,
    entries: &BTreeMap<String, String>,
    skip: &str,
) -> std::fmt::Result {
    for (key, value) in entries.iter().filter(|(k, _)| k.as_str() != skip) {
        if value.starts_with("http") {
            writeln!(
                out,
                "\t{} <a href=\"{}\">{}</a>",
                bullet,
                escape_html(value),
                escape_html(key)
            )?;
        } else {
            writeln!(out, "\t{} {}: {}", bullet, escape_html(key), escape_html(value))?;
        }
    }
    Ok(())
}

/// Telegram HTML 只要求转义这几个字符
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// 模板可见的告警组上下文
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GroupContext<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    labels: &'a BTreeMap<String, String>,
    alerts: &'a [Alert],
    firing_alerts: Vec<&'a Alert>,
    resolved_alerts: Vec<&'a Alert>,
    has_firing: bool,
    has_resolved: bool,
}

impl<'a> GroupContext<'a> {
    fn new(alert_group: &'a AlertGroup) -> Self {
        Self {
            id: &alert_group.id,
            labels: &alert_group.labels,
            alerts: &alert_group.alerts,
            firing_alerts: alert_group.firing_alerts(),
            resolved_alerts: alert_group.resolved_alerts(),
            has_firing: alert_group.has_firing(),
            has_resolved: alert_group.has_resolved(),
        }
    }
}

const TEMPLATE_NAME: &str = "alert";

/// 用户提供的 minijinja 模板，构造时编译一次
pub struct CustomTemplateRenderer {
    env: Environment<'static>,
}

impl CustomTemplateRenderer {
    /// 构造时校验语法，语法错误属于配置错误
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_filter("has_prefix", |value: String, prefix: String| {
            value.starts_with(&prefix)
        });

        env.add_template_owned(TEMPLATE_NAME, source).map_err(|e| {
            Error::InvalidConfiguration(format!("error parsing alert template: {}", e))
        })?;

        Ok(Self { env })
    }
}

impl TemplateRenderer for CustomTemplateRenderer {
    fn render(&self, alert_group: &AlertGroup) -> Result<String> {
        self.env
            .get_template(TEMPLATE_NAME)
            .and_then(|tmpl| tmpl.render(GroupContext::new(alert_group)))
            .map_err(|e| Error::RenderTemplate(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertStatus;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn restarting_alert(pod: &str, status: AlertStatus) -> Alert {
        Alert {
            status,
            labels: map(&[
                ("alertname", "ServicePodIsRestarting"),
                ("job", "kubernetes-metrics"),
                ("pod", pod),
            ]),
            annotations: map(&[
                ("message", "There has been restarting more than 5 times over 20 minutes"),
                ("runbook", "https://github.test/runbooks/pod-restarting.md"),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_renders_firing_alerts() {
        let group = AlertGroup {
            id: "test-alert".to_string(),
            alerts: vec![
                restarting_alert("ns1/pod-1", AlertStatus::Firing),
                restarting_alert("ns1/pod-2", AlertStatus::Firing),
            ],
            ..Default::default()
        };

        let got = DefaultTemplateRenderer.render(&group).unwrap();

        let expected = "🚨🚨 FIRING ALERTS 🚨🚨

💥💥💥 <b>ServicePodIsRestarting</b> 💥💥💥
  There has been restarting more than 5 times over 20 minutes
\t🔹 job: kubernetes-metrics
\t🔹 pod: ns1/pod-1
\t🔸 <a href=\"https://github.test/runbooks/pod-restarting.md\">runbook</a>

💥💥💥 <b>ServicePodIsRestarting</b> 💥💥💥
  There has been restarting more than 5 times over 20 minutes
\t🔹 job: kubernetes-metrics
\t🔹 pod: ns1/pod-2
\t🔸 <a href=\"https://github.test/runbooks/pod-restarting.md\">runbook</a>
";
        assert_eq!(got, expected);
    }

    #[test]
    fn test_default_renders_both_sections() {
        let group = AlertGroup {
            alerts: vec![
                restarting_alert("ns1/pod-1", AlertStatus::Resolved),
                restarting_alert("ns1/pod-2", AlertStatus::Firing),
            ],
            ..Default::default()
        };

        let got = DefaultTemplateRenderer.render(&group).unwrap();

        let firing = got.find("FIRING ALERTS").unwrap();
        let resolved = got.find("RESOLVED ALERTS").unwrap();
        assert!(firing < resolved);
        assert!(got.contains("🟢🟢🟢 <b>ServicePodIsRestarting</b> 🟢🟢🟢"));
        assert!(got.contains("\n\n✅✅ RESOLVED ALERTS ✅✅\n"));
    }

    #[test]
    fn test_default_empty_group_renders_nothing() {
        let group = AlertGroup {
            id: "empty".to_string(),
            alerts: vec![Alert::default()],
            ..Default::default()
        };

        let got = DefaultTemplateRenderer.render(&group).unwrap();
        assert!(got.trim().is_empty());
    }

    #[test]
    fn test_default_only_resolved_omits_firing_header() {
        let group = AlertGroup {
            alerts: vec![restarting_alert("ns1/pod-1", AlertStatus::Resolved)],
            ..Default::default()
        };

        let got = DefaultTemplateRenderer.render(&group).unwrap();
        assert!(got.starts_with("✅✅ RESOLVED ALERTS ✅✅\n"));
        assert!(!got.contains("FIRING"));
    }

    #[test]
    fn test_default_escapes_html_and_falls_back_to_name() {
        let group = AlertGroup {
            alerts: vec![Alert {
                name: "Disk<Full>".to_string(),
                status: AlertStatus::Firing,
                labels: map(&[("owner", "ops & infra")]),
                ..Default::default()
            }],
            ..Default::default()
        };

        let got = DefaultTemplateRenderer.render(&group).unwrap();
        assert!(got.contains("<b>Disk&lt;Full&gt;</b>"));
        assert!(got.contains("🔹 owner: ops &amp; infra"));
    }

    #[test]
    fn test_custom_template_renders_group() {
        let renderer =
            CustomTemplateRenderer::new("{{ ID }} has {{ Alerts | length }} alerts.").unwrap();
        let group = AlertGroup {
            id: "test-alert".to_string(),
            alerts: vec![Alert::default(), Alert::default(), Alert::default()],
            ..Default::default()
        };

        assert_eq!(renderer.render(&group).unwrap(), "test-alert has 3 alerts.");
    }

    #[test]
    fn test_custom_template_sees_status_subsets() {
        let renderer = CustomTemplateRenderer::new(
            "{% if HasFiring %}F{{ FiringAlerts | length }}{% endif %}\
             {% if HasResolved %}R{{ ResolvedAlerts | length }}{% endif %}",
        )
        .unwrap();
        let group = AlertGroup {
            alerts: vec![
                restarting_alert("a", AlertStatus::Firing),
                restarting_alert("b", AlertStatus::Firing),
            ],
            ..Default::default()
        };

        assert_eq!(renderer.render(&group).unwrap(), "F2");
    }

    #[test]
    fn test_custom_template_link_detection() {
        let renderer = CustomTemplateRenderer::new(
            "{% for k, v in Alerts[0].Annotations | items %}\
             {% if v | has_prefix(\"http\") %}link:{{ k }}{% else %}text:{{ k }}{% endif %};\
             {% endfor %}",
        )
        .unwrap();
        let group = AlertGroup {
            alerts: vec![restarting_alert("a", AlertStatus::Firing)],
            ..Default::default()
        };

        assert_eq!(
            renderer.render(&group).unwrap(),
            "text:message;link:runbook;"
        );
    }

    #[test]
    fn test_custom_template_undefined_field_is_render_error() {
        let renderer = CustomTemplateRenderer::new("{{ NotAField }}").unwrap();

        let result = renderer.render(&AlertGroup::default());
        assert!(matches!(result, Err(Error::RenderTemplate(_))));
    }

    #[test]
    fn test_custom_template_optional_annotation() {
        let renderer = CustomTemplateRenderer::new(
            "{% for a in Alerts %}\
             {% if a.Annotations.summary is defined %}{{ a.Annotations.summary }}\
             {% else %}none{% endif %};\
             {% endfor %}",
        )
        .unwrap();
        let mut with_summary = restarting_alert("a", AlertStatus::Firing);
        with_summary
            .annotations
            .insert("summary".to_string(), "pod restarts".to_string());
        let group = AlertGroup {
            alerts: vec![with_summary, restarting_alert("b", AlertStatus::Firing)],
            ..Default::default()
        };

        assert_eq!(renderer.render(&group).unwrap(), "pod restarts;none;");
    }

    #[test]
    fn test_custom_template_missing_annotation_is_render_error() {
        let renderer = CustomTemplateRenderer::new(
            "{% for a in Alerts %}{% if a.Annotations.summary %}x{% endif %}{% endfor %}",
        )
        .unwrap();
        let group = AlertGroup {
            alerts: vec![restarting_alert("a", AlertStatus::Firing)],
            ..Default::default()
        };

        assert!(matches!(
            renderer.render(&group),
            Err(Error::RenderTemplate(_))
        ));
    }

    #[test]
    fn test_custom_template_escapes_values() {
        let renderer = CustomTemplateRenderer::new("<b>{{ ID }}</b>").unwrap();
        let group = AlertGroup {
            id: "a&b".to_string(),
            ..Default::default()
        };

        assert_eq!(renderer.render(&group).unwrap(), "<b>a&amp;b</b>");
    }

    #[test]
    fn test_custom_template_syntax_error_is_configuration_error() {
        let result = CustomTemplateRenderer::new("{{ ID }");
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }
}
