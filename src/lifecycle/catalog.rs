//! Event template catalog
//!
//! Built-in templates for each event type, or a JSON catalog loaded at
//! startup. Every template's dependency graph is validated on load.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use super::error::{LifecycleError, LifecycleResult};
use super::graph::TaskGraph;
use crate::domain::{EventCategory, EventPriority, EventTemplate, Role, TaskTemplate};

/// Task due dates may sit at most a year before or after the event
pub const MAX_DUE_OFFSET_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<EventTemplate>,
    by_id: HashMap<String, usize>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<EventTemplate>) -> LifecycleResult<Self> {
        let mut by_id = HashMap::with_capacity(templates.len());
        for (i, template) in templates.iter().enumerate() {
            TaskGraph::for_template(template)?;
            for task in &template.tasks {
                if let Some(minutes) = task.due_offset_minutes {
                    if !(-MAX_DUE_OFFSET_MINUTES..=MAX_DUE_OFFSET_MINUTES).contains(&minutes) {
                        return Err(LifecycleError::DueOffsetOutOfRange {
                            task: task.key.clone(),
                            minutes,
                        });
                    }
                }
            }
            if by_id.insert(template.id.clone(), i).is_some() {
                return Err(LifecycleError::DuplicateTemplate(template.id.clone()));
            }
        }
        Ok(Self { templates, by_id })
    }

    /// Load a catalog from a JSON array of templates
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template catalog {}", path.display()))?;
        let templates: Vec<EventTemplate> =
            serde_json::from_str(&raw).context("Failed to parse template catalog")?;
        let catalog = Self::new(templates).context("Invalid template catalog")?;
        tracing::info!(
            path = %path.display(),
            templates = catalog.templates.len(),
            "Template catalog loaded"
        );
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> LifecycleResult<&EventTemplate> {
        self.by_id
            .get(id)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| LifecycleError::TemplateNotFound(id.to_string()))
    }

    pub fn list(&self) -> &[EventTemplate] {
        &self.templates
    }

    pub fn builtin() -> Self {
        Self::new(builtin_templates()).expect("built-in templates are valid")
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn template(
    id: &str,
    name: &str,
    category: EventCategory,
    default_priority: EventPriority,
    default_duration_minutes: i32,
    tasks: Vec<TaskTemplate>,
) -> EventTemplate {
    EventTemplate {
        id: id.to_string(),
        name: name.to_string(),
        category,
        default_priority,
        default_duration_minutes: Some(default_duration_minutes),
        tasks,
    }
}

fn builtin_templates() -> Vec<EventTemplate> {
    use Role::*;

    vec![
        template(
            "move-in",
            "Move-In",
            EventCategory::Leasing,
            EventPriority::High,
            120,
            vec![
                TaskTemplate::new("sign-lease", "Sign lease", Resident).due_in(-2 * 24 * 60),
                TaskTemplate::new("pay-deposit", "Pay security deposit", Resident)
                    .after(&["sign-lease"])
                    .due_in(-24 * 60),
                TaskTemplate::new("setup-utilities", "Set up utilities", Resident).optional(),
                TaskTemplate::new("prepare-unit", "Prepare unit", Maintenance).due_in(-24 * 60),
                TaskTemplate::new("final-walkthrough", "Final walkthrough", Operator)
                    .after(&["prepare-unit"]),
                TaskTemplate::new("hand-over-keys", "Hand over keys", Operator)
                    .after(&["pay-deposit", "final-walkthrough"]),
                TaskTemplate::new("move-in-inspection", "Complete move-in inspection", Resident)
                    .after(&["hand-over-keys"])
                    .due_in(3 * 24 * 60),
            ],
        ),
        template(
            "move-out",
            "Move-Out",
            EventCategory::Leasing,
            EventPriority::Medium,
            90,
            vec![
                TaskTemplate::new("submit-notice", "Submit move-out notice", Resident),
                TaskTemplate::new("pre-inspection", "Pre-move-out inspection", Operator)
                    .after(&["submit-notice"]),
                TaskTemplate::new("return-keys", "Return keys", Resident).after(&["submit-notice"]),
                TaskTemplate::new("final-inspection", "Final unit inspection", Maintenance)
                    .after(&["return-keys"]),
                TaskTemplate::new("deposit-disposition", "Deposit disposition", Operator)
                    .after(&["final-inspection"])
                    .due_in(14 * 24 * 60),
            ],
        ),
        template(
            "work-order",
            "Work Order",
            EventCategory::Maintenance,
            EventPriority::Medium,
            60,
            vec![
                TaskTemplate::new("submit-with-photos", "Submit request with photos", Resident)
                    .describe("Describe the issue and attach photos"),
                TaskTemplate::new("diagnose", "Diagnose issue", Maintenance)
                    .after(&["submit-with-photos"]),
                TaskTemplate::new("resolve", "Resolve issue", Maintenance).after(&["diagnose"]),
                TaskTemplate::new("upload-photo", "Upload completion photo", Maintenance)
                    .after(&["resolve"]),
                TaskTemplate::new("approve", "Approve work", Operator).after(&["upload-photo"]),
            ],
        ),
        template(
            "tour",
            "Property Tour",
            EventCategory::Leasing,
            EventPriority::Medium,
            45,
            vec![
                TaskTemplate::new("confirm-tour", "Confirm tour", Prospect).due_in(-60),
                TaskTemplate::new("prepare-tour", "Prepare unit for tour", Operator),
                TaskTemplate::new("conduct-tour", "Conduct tour", Operator)
                    .after(&["confirm-tour", "prepare-tour"]),
                TaskTemplate::new("submit-feedback", "Submit tour feedback", Prospect)
                    .after(&["conduct-tour"])
                    .optional(),
            ],
        ),
        template(
            "inspection",
            "Unit Inspection",
            EventCategory::Inspection,
            EventPriority::Medium,
            60,
            vec![
                TaskTemplate::new("send-notice", "Send entry notice", Operator)
                    .due_in(-24 * 60),
                TaskTemplate::new("conduct-inspection", "Conduct inspection", Maintenance)
                    .after(&["send-notice"]),
                TaskTemplate::new("upload-report", "Upload inspection report", Maintenance)
                    .after(&["conduct-inspection"]),
                TaskTemplate::new("review-report", "Review report", Operator)
                    .after(&["upload-report"]),
            ],
        ),
        template(
            "vendor-service",
            "Vendor Service",
            EventCategory::VendorService,
            EventPriority::Medium,
            120,
            vec![
                TaskTemplate::new("dispatch-vendor", "Dispatch vendor", Operator),
                TaskTemplate::new("accept-job", "Accept job", Vendor).after(&["dispatch-vendor"]),
                TaskTemplate::new("complete-service", "Complete service", Vendor)
                    .after(&["accept-job"]),
                TaskTemplate::new("upload-invoice", "Upload invoice", Vendor)
                    .after(&["complete-service"]),
                TaskTemplate::new("approve-invoice", "Approve invoice", Operator)
                    .after(&["upload-invoice"]),
            ],
        ),
        template(
            "lease-renewal",
            "Lease Renewal",
            EventCategory::ResidentServices,
            EventPriority::Low,
            30,
            vec![
                TaskTemplate::new("send-offer", "Send renewal offer", Operator),
                TaskTemplate::new("review-offer", "Review renewal offer", Resident)
                    .after(&["send-offer"]),
                TaskTemplate::new("sign-renewal", "Sign renewal", Resident)
                    .after(&["review-offer"]),
                TaskTemplate::new("countersign", "Countersign renewal", Operator)
                    .after(&["sign-renewal"]),
            ],
        ),
    ]
}
