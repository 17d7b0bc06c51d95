//! Email Service
//!
//! Renders transactional emails and hands them to the configured
//! [`EmailSender`]. Sending is best effort: a failure is logged and never
//! propagated to the request that triggered it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::services::{EmailMessage, EmailSender};
use crate::domain::{BookingContext, Money, Ticket, User};

#[derive(Clone)]
pub struct EmailService {
    sender: Arc<dyn EmailSender>,
}

impl EmailService {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    async fn deliver(&self, message: EmailMessage, kind: &'static str) {
        match self.sender.send(&message).await {
            Ok(()) => info!(to = %message.to, kind, "Email sent"),
            Err(e) => warn!(to = %message.to, kind, error = %e, "Email delivery failed"),
        }
    }

    pub async fn send_welcome(&self, user: &User) {
        self.deliver(welcome_email(user), "welcome").await;
    }

    pub async fn send_booking_confirmation(&self, context: &BookingContext, tickets: &[Ticket]) {
        self.deliver(confirmation_email(context, tickets), "booking_confirmation")
            .await;
    }

    pub async fn send_booking_cancellation(&self, context: &BookingContext, refund: Option<&Money>) {
        self.deliver(cancellation_email(context, refund), "booking_cancellation")
            .await;
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #b91c1c;">{title}</h2>
{body}
</div>
</body>
</html>"#,
        title = escape(title),
        body = body
    )
}

pub(crate) fn welcome_email(user: &User) -> EmailMessage {
    let subject = "Welcome to Cinema Tickets".to_string();
    let text_body = format!(
        "Hi {},\n\nYour account is ready. Browse what's showing and book your seats anytime.\n",
        user.full_name
    );
    let html_body = html_page(
        &subject,
        &format!(
            "<p>Hi {},</p><p>Your account is ready. Browse what's showing and book your seats anytime.</p>",
            escape(&user.full_name)
        ),
    );
    EmailMessage {
        to: user.email.clone(),
        subject,
        html_body,
        text_body,
    }
}

pub(crate) fn confirmation_email(context: &BookingContext, tickets: &[Ticket]) -> EmailMessage {
    let booking = &context.booking;
    let starts = context.starts_at.format("%Y-%m-%d %H:%M UTC").to_string();
    let seats = booking.seat_labels().join(", ");
    let codes: Vec<&str> = tickets.iter().map(|t| t.ticket_code.as_str()).collect();
    let subject = format!("Booking {} confirmed: {}", booking.booking_code, context.movie_title);

    let text_body = format!(
        "Hi {name},\n\nYour booking {code} is confirmed.\n\n\
         Movie: {movie}\nWhere: {branch}, {hall}\nWhen: {starts}\nSeats: {seats}\n\
         Tickets: {tickets}\nTotal: {total}\n\nEnjoy the show!\n",
        name = context.user_name,
        code = booking.booking_code,
        movie = context.movie_title,
        branch = context.branch_name,
        hall = context.hall_name,
        starts = starts,
        seats = seats,
        tickets = codes.join(", "),
        total = booking.total,
    );

    let ticket_items: String = codes
        .iter()
        .map(|code| format!("<li><code>{}</code></li>", escape(code)))
        .collect();
    let html_body = html_page(
        &subject,
        &format!(
            "<p>Hi {name},</p><p>Your booking <strong>{code}</strong> is confirmed.</p>\
             <table>\
             <tr><td>Movie</td><td>{movie}</td></tr>\
             <tr><td>Where</td><td>{branch}, {hall}</td></tr>\
             <tr><td>When</td><td>{starts}</td></tr>\
             <tr><td>Seats</td><td>{seats}</td></tr>\
             <tr><td>Total</td><td>{total}</td></tr>\
             </table><p>Tickets:</p><ul>{tickets}</ul><p>Enjoy the show!</p>",
            name = escape(&context.user_name),
            code = escape(&booking.booking_code),
            movie = escape(&context.movie_title),
            branch = escape(&context.branch_name),
            hall = escape(&context.hall_name),
            starts = starts,
            seats = escape(&seats),
            total = booking.total,
            tickets = ticket_items,
        ),
    );

    EmailMessage {
        to: context.user_email.clone(),
        subject,
        html_body,
        text_body,
    }
}

pub(crate) fn cancellation_email(context: &BookingContext, refund: Option<&Money>) -> EmailMessage {
    let booking = &context.booking;
    let starts = context.starts_at.format("%Y-%m-%d %H:%M UTC").to_string();
    let subject = format!("Booking {} cancelled", booking.booking_code);
    let refund_line = match refund {
        Some(amount) => format!("A refund of {} is on its way to your card.", amount),
        None => "No payment was taken for this booking.".to_string(),
    };

    let text_body = format!(
        "Hi {},\n\nYour booking {} for {} on {} has been cancelled.\n{}\n",
        context.user_name, booking.booking_code, context.movie_title, starts, refund_line
    );
    let html_body = html_page(
        &subject,
        &format!(
            "<p>Hi {},</p><p>Your booking <strong>{}</strong> for {} on {} has been cancelled.</p><p>{}</p>",
            escape(&context.user_name),
            escape(&booking.booking_code),
            escape(&context.movie_title),
            starts,
            escape(&refund_line)
        ),
    );

    EmailMessage {
        to: context.user_email.clone(),
        subject,
        html_body,
        text_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{sample_context, sample_ticket};
    use crate::domain::services::{EmailError, MockEmailSender};

    #[test]
    fn test_confirmation_lists_seats_and_codes() {
        let context = sample_context();
        let tickets = vec![sample_ticket(&context.booking, "TKTCODE00001")];

        let message = confirmation_email(&context, &tickets);

        assert_eq!(message.to, context.user_email);
        assert!(message.subject.contains(&context.booking.booking_code));
        assert!(message.text_body.contains("B4"));
        assert!(message.text_body.contains("TKTCODE00001"));
        assert!(message.text_body.contains("25.00 USD"));
        assert!(message.html_body.contains("<code>TKTCODE00001</code>"));
    }

    #[test]
    fn test_cancellation_mentions_refund() {
        let context = sample_context();
        let with_refund = cancellation_email(&context, Some(&Money::new(2500, "usd")));
        assert!(with_refund.text_body.contains("refund of 25.00 USD"));

        let without = cancellation_email(&context, None);
        assert!(without.text_body.contains("No payment was taken"));
    }

    #[test]
    fn test_html_is_escaped() {
        let user = User {
            email: "x@example.com".into(),
            full_name: "<script>".into(),
            ..User::default()
        };
        let message = welcome_email(&user);
        assert!(message.html_body.contains("&lt;script&gt;"));
        assert!(!message.html_body.contains("<script>"));
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailError::Transport("connection refused".into())));

        let service = EmailService::new(Arc::new(sender));
        service
            .send_welcome(&User {
                email: "jane@example.com".into(),
                full_name: "Jane".into(),
                ..User::default()
            })
            .await;
    }
}
