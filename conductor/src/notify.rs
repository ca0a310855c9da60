use core::error::EtlError;

/// The payload delivered to a file owner, matching spec.md §6's
/// `notify_owner({file_name, error_kind, error_message, run_log_id,
/// recipients})` interface exactly, so a real transport only has to
/// render these fields rather than reconstruct them from an `EtlError`.
pub struct OwnerNotification<'a> {
    pub file_name: &'a str,
    pub source_name: &'a str,
    pub error_kind: &'a str,
    pub error_message: String,
    pub run_log_id: &'a str,
    pub recipients: &'a [String],
}

/// Routes a file error to the file's owner (data-quality issues: bad
/// headers, threshold breaches, failed audits), as soon as that file's
/// pipeline fails.
///
/// The original's `send_failure_notification`/`send_slack_notification`
/// deliver over SMTP and a Slack webhook; this workspace ships only the
/// sink trait plus a logging default, per spec.md §1's explicit scope cut
/// - standing up real transports belongs to the binary that embeds this
/// crate, not to the pipeline logic itself.
pub trait NotifyOwner: Send + Sync {
    fn notify_owner(&self, notification: &OwnerNotification<'_>);
}

/// Routes code-actionable failures to the operator - but only once per
/// run, as a single aggregated summary (spec.md §6: "called with an
/// aggregated summary whenever any code-actionable failure is present in
/// a run"), not per file. Returns whether the summary was delivered; the
/// loader's exit contract (spec.md §6) is non-zero only when a
/// code-actionable failure occurred *and* this returns `false`.
pub trait NotifyOperator: Send + Sync {
    fn notify_operator(&self, summary: &str, details: &[String]) -> bool;
}

/// Default sink: logs at `warn`/`error` instead of delivering anywhere.
/// Logging never "fails" to be reachable, so `notify_operator` always
/// reports delivery.
pub struct LoggingNotifier;

impl NotifyOwner for LoggingNotifier {
    fn notify_owner(&self, notification: &OwnerNotification<'_>) {
        tracing::warn!(
            file_name = notification.file_name,
            source_name = notification.source_name,
            error_kind = notification.error_kind,
            error_message = %notification.error_message,
            run_log_id = notification.run_log_id,
            recipients = ?notification.recipients,
            "notifying file owner"
        );
    }
}

impl NotifyOperator for LoggingNotifier {
    fn notify_operator(&self, summary: &str, details: &[String]) -> bool {
        tracing::error!(summary, ?details, "notifying operator");
        true
    }
}

/// Notifies the file's owner if, and only if, `error` is file-actionable
/// (spec.md §7's `FILE_ERROR_EXCEPTIONS` routing). Code-actionable errors
/// are left for the worker boundary to aggregate across the whole run
/// (spec.md §2: "Failures are classified at the worker boundary").
pub fn notify_owner_if_applicable(
    owner: &dyn NotifyOwner,
    filename: &str,
    source_name: &str,
    run_log_id: &str,
    recipients: &[String],
    error: &EtlError,
) {
    if error.notify_owner() {
        owner.notify_owner(&OwnerNotification {
            file_name: filename,
            source_name,
            error_kind: error.kind_name(),
            error_message: error.to_string(),
            run_log_id,
            recipients,
        });
    }
}
