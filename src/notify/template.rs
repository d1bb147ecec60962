//! Per-phase notification templates.
//!
//! Each (recipient role, phase) pair selects a subject line and HTML body.
//! Templates bake in the session snapshot and last known location so a
//! recipient can act without logging into anything.

use crate::escalation::phase::EscalationPhase;
use crate::model::LocationData;

use super::{AlertContext, NotificationRequest, RecipientRole};

/// A rendered notification.
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub html: String,
}

/// Human-readable location line with a fixed fallback.
pub fn format_location(location: Option<&LocationData>) -> String {
    match location {
        Some(loc) => loc.to_string(),
        None => "Location unavailable".to_string(),
    }
}

/// Select and render the template for a request.
pub fn render(request: &NotificationRequest) -> Message {
    match (request.role, request.phase) {
        (RecipientRole::Owner, EscalationPhase::Emergency) => owner_emergency(request),
        (RecipientRole::Owner, _) => owner_overdue(request),
        (RecipientRole::EmergencyContact, EscalationPhase::Emergency) => {
            contact_emergency(request)
        }
        (RecipientRole::EmergencyContact, _) => contact_critical(request),
        (RecipientRole::LegalContact, EscalationPhase::Emergency) => legal_emergency(request),
        (RecipientRole::LegalContact, _) => legal_alert(request),
    }
}

fn session_details(ctx: &AlertContext) -> String {
    let mut items = String::new();
    items.push_str(&format!(
        "<li><strong>Last known location:</strong> {}</li>",
        format_location(ctx.location.as_ref())
    ));
    if let Some(session) = &ctx.session {
        items.push_str(&format!(
            "<li><strong>Session started:</strong> {}</li>\
             <li><strong>Protection level:</strong> {}</li>\
             <li><strong>Destination:</strong> {}</li>",
            session.started_at.format("%Y-%m-%d %H:%M UTC"),
            session.protection_level,
            if session.destination.is_empty() {
                "Not specified"
            } else {
                &session.destination
            },
        ));
        if !session.notes.is_empty() {
            items.push_str(&format!("<li><strong>Notes:</strong> {}</li>", session.notes));
        }
    }
    items.push_str(&format!(
        "<li><strong>Alert time:</strong> {}</li>",
        ctx.triggered_at.format("%Y-%m-%d %H:%M UTC")
    ));
    format!("<ul>{items}</ul>")
}

fn owner_overdue(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    Message {
        subject: "Safety check-in overdue - please confirm you're safe".to_string(),
        html: format!(
            "<p>Hi {name},</p>\
             <p><strong>You haven't checked in for your active safety session.</strong> \
             Please open ChainAlert and check in now to stop further escalation.</p>\
             <p>If you don't check in, your emergency contacts will be notified after \
             60 minutes and your legal contacts after 24 hours.</p>\
             {details}\
             <p>If you are safe, a single check-in resets everything.</p>",
            name = ctx.user_name,
            details = session_details(ctx),
        ),
    }
}

fn owner_emergency(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    Message {
        subject: "EMERGENCY alert activated on your ChainAlert account".to_string(),
        html: format!(
            "<p>Hi {name},</p>\
             <p><strong>An emergency alert has been broadcast to all of your emergency \
             and legal contacts.</strong></p>\
             {details}\
             <p>If this was triggered in error, contact each recipient directly to \
             stand them down. If you are in danger, call 911.</p>",
            name = ctx.user_name,
            details = session_details(ctx),
        ),
    }
}

fn contact_critical(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    Message {
        subject: format!("URGENT: {} hasn't checked in", ctx.user_name),
        html: format!(
            "<p>Hi {contact},</p>\
             <p>You are receiving this because you are listed as an emergency contact \
             for {name}.</p>\
             <p><strong>{name} has not checked in for their safety session and may \
             need assistance.</strong></p>\
             <p><strong>What we know:</strong></p>\
             {details}\
             <p><strong>Recommended actions:</strong></p>\
             <ol>\
             <li>Try calling or texting {name} immediately</li>\
             <li>Check their last known location if possible</li>\
             <li>Contact other emergency contacts to coordinate</li>\
             <li>If you cannot reach them within 30 minutes, consider contacting \
             local authorities</li>\
             </ol>\
             <p><strong>If you believe {name} is in immediate danger, call 911 now.</strong></p>",
            contact = request.to_name,
            name = ctx.user_name,
            details = session_details(ctx),
        ),
    }
}

fn contact_emergency(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    Message {
        subject: format!("EMERGENCY: {} needs immediate help", ctx.user_name),
        html: format!(
            "<p>Hi {contact},</p>\
             <p><strong>{name} has triggered an emergency alert and may be in \
             immediate danger or detention.</strong></p>\
             <p><strong>Immediate actions:</strong></p>\
             <ol>\
             <li>Call {name} immediately - try all known phone numbers</li>\
             <li>Text {name} and ask for confirmation of safety</li>\
             <li>Check the last known location below</li>\
             <li>Contact other emergency contacts to coordinate a response</li>\
             <li>If no response within 30 minutes, consider contacting local authorities</li>\
             </ol>\
             {details}\
             <p><strong>IF {name_upper} IS IN IMMEDIATE DANGER, CALL 911 NOW.</strong></p>\
             <p>Emergency services: 911<br>\
             ICE Detainee Hotline: 1-888-351-4024<br>\
             ACLU Immigrants' Rights: 1-877-336-8800</p>",
            contact = request.to_name,
            name = ctx.user_name,
            name_upper = ctx.user_name.to_uppercase(),
            details = session_details(ctx),
        ),
    }
}

fn legal_alert(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    let organization = request.organization.as_deref().unwrap_or("Legal Organization");
    Message {
        subject: format!("URGENT: 24-Hour Safety Escalation - {}", ctx.user_name),
        html: format!(
            "<p>Dear {contact} ({organization}),</p>\
             <p><strong>24-hour safety escalation:</strong> no check-in activity for \
             24+ hours. This case may require legal attention.</p>\
             <p><strong>Individual information:</strong></p>\
             {details}\
             <p><strong>Recommended immediate actions:</strong></p>\
             <ol>\
             <li>Contact local law enforcement to request a welfare check</li>\
             <li>File a missing person/detention report if the individual cannot be located</li>\
             <li>Attempt legal intervention through appropriate channels</li>\
             </ol>\
             <p><strong>Available documentation:</strong> signed consent forms, complete \
             session audit trail, GPS location history, emergency contact list, and the \
             24-hour no-activity report.</p>\
             <p>This notification is sent in accordance with the individual's signed \
             consent form.</p>",
            contact = request.to_name,
            organization = organization,
            details = session_details(ctx),
        ),
    }
}

fn legal_emergency(request: &NotificationRequest) -> Message {
    let ctx = &request.context;
    let organization = request.organization.as_deref().unwrap_or("Legal Organization");
    Message {
        subject: format!("LEGAL ALERT: {} - Emergency Case File", ctx.user_name),
        html: format!(
            "<p>Dear {contact} ({organization}),</p>\
             <p>One of your protected individuals has activated an emergency alert. \
             This indicates they may be in immediate danger or have been detained.</p>\
             <p><strong>Case information:</strong></p>\
             {details}\
             <p><strong>Contact email:</strong> {email}</p>\
             <p><strong>Recommended actions:</strong></p>\
             <ol>\
             <li>Attempt to contact the individual directly</li>\
             <li>Coordinate with their emergency contacts (also notified)</li>\
             <li>Prepare case documentation in case legal intervention is needed</li>\
             </ol>\
             <p>This individual has provided explicit consent for your organization to \
             be notified in emergency situations.</p>",
            contact = request.to_name,
            organization = organization,
            email = ctx.user_email,
            details = session_details(ctx),
        ),
    }
}
