//! The descriptor tables for each category.

use tracing::info;

use super::{Binding, Category, ConfigValue, FieldValue, OptionDescriptor, OptionKind, OptionParams};
use crate::model::list::{ListConfig, MailingList};

const NO_YES: OptionParams = OptionParams::Choices(&["No", "Yes"]);
const AREA: OptionParams = OptionParams::Area(4, 60);
const BIG_AREA: OptionParams = OptionParams::Area(10, 60);

fn store<T: FieldValue>(slot: &mut T, value: ConfigValue) -> bool {
    match T::from_value(value) {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

macro_rules! field {
    ($name:ident, $kind:ident, $params:expr, $desc:expr) => {
        field!($name, $kind, $params, false, $desc, None)
    };
    ($name:ident, $kind:ident, $params:expr, $dep:expr, $desc:expr, $elab:expr) => {
        OptionDescriptor {
            name: stringify!($name),
            kind: OptionKind::$kind,
            params: $params,
            dependent: $dep,
            description: $desc,
            elaboration: $elab,
            binding: Binding::Field {
                get: |c: &ListConfig| c.$name.to_value(),
                set: |c: &mut ListConfig, v: ConfigValue| store(&mut c.$name, v),
            },
        }
    };
}

pub(super) fn descriptors(category: Category) -> Vec<OptionDescriptor> {
    match category {
        Category::General => general(),
        Category::Members => Vec::new(),
        Category::Privacy => privacy(),
        Category::Nondigest => nondigest(),
        Category::Digest => digest(),
        Category::Bounce => bounce(),
        Category::Archive => archive(),
        Category::Gateway => gateway(),
        Category::Autoreply => autoreply(),
    }
}

fn general() -> Vec<OptionDescriptor> {
    vec![
        field!(
            real_name,
            String,
            OptionParams::Width(50),
            false,
            "The public name of this list (make case-changes only).",
            Some(
                "The capitalization of this name can be changed to make it presentable \
                 in polite company as a proper noun, or to make an acronym part all upper \
                 case, etc. The name is otherwise fixed."
            )
        ),
        field!(owner, EmailList, AREA, "The list administrator email addresses."),
        field!(
            description,
            String,
            OptionParams::Width(50),
            "A terse phrase identifying this list."
        ),
        field!(info, Text, BIG_AREA, "An introductory description of the list."),
        field!(
            subject_prefix,
            String,
            OptionParams::Width(10),
            "Prefix for subject line of list postings."
        ),
        field!(welcome_msg, Text, AREA, "List-specific text prepended to new-subscriber welcome message."),
        field!(goodbye_msg, Text, AREA, "Text sent to people leaving the list."),
        field!(
            reply_goes_to_list,
            Radio,
            OptionParams::Choices(&["Poster", "This list", "Explicit address"]),
            "Where are replies to list messages directed?"
        ),
        field!(
            reply_to_address,
            Email,
            OptionParams::Width(40),
            "Explicit Reply-To: header."
        ),
        field!(administrivia, Toggle, NO_YES, "Scan postings for administrative requests?"),
        field!(send_reminders, Toggle, NO_YES, "Send monthly password reminders?"),
        field!(send_welcome_msg, Toggle, NO_YES, "Send welcome message to newly subscribed members?"),
        field!(send_goodbye_msg, Toggle, NO_YES, "Send goodbye message to members when they are unsubscribed?"),
        field!(
            admin_immed_notify,
            Toggle,
            NO_YES,
            "Should administrator get immediate notice of new requests?"
        ),
        field!(
            max_message_size,
            Number,
            OptionParams::Width(7),
            "Maximum length in Kb of a message body. Use 0 for no limit."
        ),
        field!(host_name, Host, OptionParams::Width(50), "Host name this list prefers for email."),
        field!(
            preferred_language,
            String,
            OptionParams::Width(5),
            "Default language for this list."
        ),
        field!(
            admin_member_chunksize,
            Number,
            OptionParams::Width(4),
            "Number of members shown per page on the membership screen."
        ),
    ]
}

fn privacy() -> Vec<OptionDescriptor> {
    vec![
        field!(advertised, Toggle, NO_YES, "Advertise this list when people ask what lists are on this machine?"),
        field!(
            subscribe_policy,
            Radio,
            OptionParams::Choices(&["None", "Confirm", "Require approval", "Confirm and approve"]),
            true,
            "What steps are required for subscription?",
            Some(
                "None: no verification steps (not recommended). Confirm: email \
                 confirmation step required. Require approval: require list administrator \
                 approval. Confirm and approve: both."
            )
        ),
        field!(
            unsubscribe_policy,
            Toggle,
            NO_YES,
            "Is the list moderator's approval required for unsubscription requests?"
        ),
        field!(ban_list, EmailList, AREA, "List of addresses which are banned from membership in this mailing list."),
        field!(
            private_roster,
            Radio,
            OptionParams::Choices(&["Anyone", "List members", "List admin only"]),
            "Who can view subscription list?"
        ),
        field!(obscure_addresses, Toggle, NO_YES, "Show member addresses so they're not directly recognizable as email addresses?"),
        field!(
            member_posting_only,
            Toggle,
            NO_YES,
            true,
            "Restrict posting privilege to list members?",
            None
        ),
        field!(posters, EmailList, AREA, true, "Addresses of members accepted for posting to this list without implicit approval.", None),
        field!(moderated, Toggle, NO_YES, "Must posts be approved by an administrator?"),
        field!(
            require_explicit_destination,
            Toggle,
            NO_YES,
            "Must posts have list named in destination (to, cc) field?"
        ),
        field!(acceptable_aliases, Text, AREA, "Alias names (regexps) which qualify as explicit to or cc destination names for this list."),
        field!(
            max_num_recipients,
            Number,
            OptionParams::Width(5),
            "Ceiling on acceptable number of recipients for a posting."
        ),
    ]
}

fn nondigest() -> Vec<OptionDescriptor> {
    vec![
        field!(
            nondigestable,
            Toggle,
            NO_YES,
            true,
            "Can subscribers choose to receive mail immediately, rather than in batched digests?",
            None
        ),
        field!(msg_header, Text, AREA, "Header added to mail sent to regular list members."),
        field!(msg_footer, Text, AREA, "Footer added to mail sent to regular list members."),
    ]
}

fn digest() -> Vec<OptionDescriptor> {
    vec![
        field!(
            digestable,
            Toggle,
            NO_YES,
            true,
            "Can list members choose to receive list traffic bunched in digests?",
            None
        ),
        field!(
            digest_is_default,
            Radio,
            OptionParams::Choices(&["Regular", "Digest"]),
            "Which delivery mode is the default for new users?"
        ),
        field!(
            mime_is_default_digest,
            Radio,
            OptionParams::Choices(&["Plain", "MIME"]),
            "When receiving digests, which format is default?"
        ),
        field!(
            digest_size_threshhold,
            Number,
            OptionParams::Width(5),
            "How big in Kb should a digest be before it gets sent out?"
        ),
        field!(
            digest_send_periodic,
            Toggle,
            NO_YES,
            "Should a digest be dispatched daily when the size threshold isn't reached?"
        ),
        field!(digest_header, Text, AREA, "Header added to every digest."),
        field!(digest_footer, Text, AREA, "Footer added to every digest."),
    ]
}

fn bounce() -> Vec<OptionDescriptor> {
    vec![
        field!(bounce_processing, Toggle, NO_YES, "Try to figure out error messages automatically?"),
        field!(
            minimum_removal_date,
            Number,
            OptionParams::Width(3),
            "Minimum number of days an address has been non-fatally bad before we take action."
        ),
        field!(
            minimum_post_count_before_bounce_action,
            Number,
            OptionParams::Width(3),
            "Minimum number of posts to the list since members first bounce before we consider removing them."
        ),
        field!(
            automatic_bounce_action,
            Radio,
            OptionParams::Choices(&[
                "Do nothing",
                "Disable and notify me",
                "Disable and DON'T notify me",
                "Remove and notify me",
            ]),
            "Action when critical or excessive bounces are detected."
        ),
        field!(
            max_posts_between_bounces,
            Number,
            OptionParams::Width(3),
            "Maximum number of messages your list gets in an hour."
        ),
        field!(
            bounce_matching_headers,
            Text,
            BIG_AREA,
            false,
            "Hold posts with header value matching a specified regexp.",
            Some(
                "Use this option to prohibit posts according to specific header values. \
                 Each line is a 'header-name: regexp' pair; lines that start with '#' \
                 are comments."
            )
        ),
    ]
}

fn archive() -> Vec<OptionDescriptor> {
    vec![
        field!(archive, Toggle, NO_YES, "Archive messages?"),
        field!(
            archive_private,
            Radio,
            OptionParams::Choices(&["public", "private"]),
            "Is archive file source for public or private archival?"
        ),
        field!(
            archive_volume_frequency,
            Radio,
            OptionParams::Choices(&["Yearly", "Monthly", "Quarterly", "Weekly", "Daily"]),
            "How often should a new archive volume be started?"
        ),
        field!(scrub_nondigest, Toggle, NO_YES, "Remove attachments from archived messages?"),
    ]
}

fn gateway() -> Vec<OptionDescriptor> {
    vec![
        field!(nntp_host, Host, OptionParams::Width(50), "The Internet address of the machine your News server is running on."),
        field!(linked_newsgroup, String, OptionParams::Width(50), "The name of the Usenet group to gateway to and/or from."),
        field!(gateway_to_news, Toggle, NO_YES, "Should new posts to the mailing list be sent to the newsgroup?"),
        field!(gateway_to_mail, Toggle, NO_YES, "Should new posts to the newsgroup be sent to the mailing list?"),
        OptionDescriptor {
            name: "_mass_catchup",
            kind: OptionKind::Toggle,
            params: NO_YES,
            dependent: false,
            description: "Should Mailman perform a catchup on the newsgroup?",
            elaboration: Some(
                "When you tell the list to perform a catchup on the newsgroup, future \
                 mail-to-news gatewaying will start with the next new message found. \
                 All earlier messages on the newsgroup will be ignored."
            ),
            binding: Binding::Action(mass_catchup),
        },
    ]
}

fn autoreply() -> Vec<OptionDescriptor> {
    vec![
        field!(autorespond_postings, Toggle, NO_YES, "Should an automatic response be sent to posters?"),
        field!(autoresponse_postings_text, FileUpload, AREA, "Auto-response text to send to posters."),
        field!(autorespond_admin, Toggle, NO_YES, "Should an automatic response be sent to mail sent to the -owner address?"),
        field!(autoresponse_admin_text, FileUpload, AREA, "Auto-response text to send to -owner emails."),
        field!(
            autorespond_requests,
            Radio,
            OptionParams::Choices(&["No", "Yes, w/discard", "Yes, w/forward"]),
            "Should an automatic response be sent to mail sent to the -request address?"
        ),
        field!(autoresponse_request_text, FileUpload, AREA, "Auto-response text to send to -request emails."),
        field!(
            autoresponse_graceperiod,
            Number,
            OptionParams::Width(3),
            "Number of days between auto-responses to the same poster."
        ),
    ]
}

/// Arm a catch-up: the next gateway run skips the newsgroup backlog.
fn mass_catchup(list: &mut MailingList, value: &ConfigValue) {
    if value.is_truthy() {
        list.usenet_watermark = None;
        info!(list = %list.internal_name(), "Newsgroup catch-up armed");
    }
}
