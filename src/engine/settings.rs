//! The administrator's configuration pages.

use tracing::{info, warn};

use super::roster::{self, RosterReport};
use super::subscribe::{self, SubscribeReport};
use super::{Role, SessionCredential};
use crate::bounce::RuleLineError;
use crate::config::SiteConfig;
use crate::error::{ListError, PasswordError, Result};
use crate::form::{self, FormData};
use crate::model::list::{MailingList, SanityWarning};
use crate::model::password::PasswordHash;
use crate::schema::{Binding, Category};
use crate::store::ListStore;
use crate::validate::validate;

const REAL_NAME: &str = "real_name";
const BOUNCE_MATCHING_HEADERS: &str = "bounce_matching_headers";

/// Outcome of [`apply_config_changes`].
#[derive(Debug, Default)]
pub struct ConfigReport {
    /// Fields whose stored value changed, in schema order.
    pub changed: Vec<&'static str>,
    /// Fields that were submitted but not written, with the reason.
    pub rejected: Vec<(&'static str, String)>,
    /// Action fields that ran.
    pub actions: Vec<&'static str>,
    pub warnings: Vec<SanityWarning>,
    /// Problems in the bounce rule text, when it was submitted.
    pub bounce_errors: Vec<RuleLineError>,
}

/// Apply the submitted values for every option of `category`.
///
/// Each field is validated on its own. Values that fail validation revert
/// silently; guarded fields are reported in `rejected`. Neither stops the
/// remaining fields.
pub fn apply_config_changes(
    list: &mut MailingList,
    role: Role,
    category: Category,
    form: &FormData,
    site: &SiteConfig,
) -> Result<ConfigReport> {
    if !role.is_admin() {
        return Err(ListError::PermissionDenied("only list or site administrators may change list settings"));
    }
    let mut report = ConfigReport::default();

    for descriptor in category.descriptors() {
        let Some(raw) = form.text_or_upload(descriptor.name) else {
            continue;
        };
        let raw = form::inbound_value(descriptor.name, raw, site.allow_open_subscribe);
        let validated = validate(&list.config, descriptor, &raw);

        match descriptor.binding {
            Binding::Action(action) => {
                if validated.value.is_truthy() {
                    action(list, &validated.value);
                    report.actions.push(descriptor.name);
                }
            }
            Binding::Field { set, .. } => {
                if descriptor.name == BOUNCE_MATCHING_HEADERS {
                    // Surface rule problems even when the text is unchanged.
                    report.bounce_errors = crate::bounce::parse_rules(&raw).errors;
                }
                if !validated.changed {
                    continue;
                }
                if descriptor.name == REAL_NAME {
                    let proposed = validated.value.to_string();
                    if proposed.to_lowercase() != list.internal_name().to_lowercase() {
                        warn!(list = %list.internal_name(), proposed = %proposed, "Rejected display name change");
                        report.rejected.push((
                            descriptor.name,
                            "real_name attribute not changed! It must differ from the \
                             list's name by case only."
                                .to_string(),
                        ));
                        continue;
                    }
                }
                if set(&mut list.config, validated.value) {
                    report.changed.push(descriptor.name);
                } else {
                    warn!(list = %list.internal_name(), field = descriptor.name, "Value not representable");
                    report
                        .rejected
                        .push((descriptor.name, "value not representable for this field".to_string()));
                }
            }
        }
    }

    report.warnings = list.sanity_warnings();
    if !report.changed.is_empty() || !report.actions.is_empty() {
        info!(
            list = %list.internal_name(),
            category = %category,
            changed = ?report.changed,
            actions = ?report.actions,
            "List configuration changed"
        );
    }
    Ok(report)
}

/// The administrator password change: the current password, then the new one
/// twice. On success the stored hash is replaced and a fresh credential for
/// the caller is returned.
pub fn change_admin_password(
    list: &mut MailingList,
    role: Role,
    current: &str,
    new: &str,
    confirm: Option<&str>,
) -> std::result::Result<SessionCredential, PasswordError> {
    let Some(confirm) = confirm else {
        return Err(PasswordError::MissingConfirmation);
    };
    if current.is_empty() || !list.admin_password.verify(current) {
        return Err(PasswordError::BadCurrent);
    }
    let (new, confirm) = (new.trim(), confirm.trim());
    if new.is_empty() && confirm.is_empty() {
        return Err(PasswordError::Blank);
    }
    if new != confirm {
        return Err(PasswordError::Mismatch);
    }
    list.admin_password = PasswordHash::new(new);
    info!(list = %list.internal_name(), "Administrator password changed");
    Ok(SessionCredential::new(role, list.internal_name(), None, &list.admin_password))
}

/// Everything one administrator form submission did.
#[derive(Debug, Default)]
pub struct AdminReport {
    pub password: Option<std::result::Result<SessionCredential, PasswordError>>,
    pub config: ConfigReport,
    pub subscribe: Option<SubscribeReport>,
    pub roster: Option<RosterReport>,
}

/// Process one administrator form for `category` under the list's lock:
/// password change, option values, then (for the members category) mass
/// subscription and the roster table.
pub fn submit_admin_form(
    store: &ListStore,
    list_name: &str,
    role: Role,
    category: Category,
    form: &FormData,
    site: &SiteConfig,
) -> Result<AdminReport> {
    if !role.is_admin() {
        return Err(ListError::PermissionDenied("administrator access required"));
    }
    store.with_list(list_name, |list| {
        let mut report = AdminReport::default();
        if form.has("newpw") {
            report.password = Some(change_admin_password(
                list,
                role,
                form.get("adminpw").unwrap_or_default(),
                form.get("newpw").unwrap_or_default(),
                form.get("confirmpw"),
            ));
        }
        if category == Category::Members {
            if let Some(text) = form.get("subscribees") {
                let send_welcome = form
                    .get_int("send_welcome_msg_to_this_batch")
                    .map_or(list.config.send_welcome_msg, |v| v != 0);
                let lines = subscribe::parse_batch_text(text);
                report.subscribe = Some(subscribe::batch_subscribe(list, &lines, false, send_welcome, site));
            }
            if form.has(roster::USER_FIELD) {
                report.roster = Some(roster::update_roster(list, form));
            }
        } else {
            report.config = apply_config_changes(list, role, category, form, site)?;
        }
        Ok(report)
    })
}
