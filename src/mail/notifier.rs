use actix::Addr;

use crate::actors::{MailerActor, SendEmail};
use crate::domain::contact::ContactMessage;
use crate::domain::order::{Order, PaymentMethod};
use crate::domain::user::User;

use super::EmailMessage;

/// Builds the shop's transactional emails and queues them on the mailer
#[derive(Clone)]
pub struct Notifier {
    mailer: Addr<MailerActor>,
    shop_email: String,
}

impl Notifier {
    pub fn new(mailer: Addr<MailerActor>, shop_email: impl Into<String>) -> Self {
        Self {
            mailer,
            shop_email: shop_email.into(),
        }
    }

    pub fn welcome(&self, user: &User) {
        self.queue(EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Welcome to the shop".into(),
            text: format!("Hi {},\n\nYour account is ready.", user.name),
            template: "welcome",
        });
    }

    pub fn order_placed(&self, order: &Order) {
        let lines: Vec<String> = order
            .items
            .iter()
            .map(|item| format!("  {} x {} @ {}", item.quantity, item.name, item.price))
            .collect();

        let next_step = match order.payment_method {
            PaymentMethod::Card => "Complete your card payment to start processing.",
            PaymentMethod::BankTransfer => {
                "Upload your bank transfer slip so we can verify the payment."
            }
        };

        self.queue(EmailMessage {
            to: order.owner.email().to_string(),
            subject: format!("Order {} received", order.order_number),
            text: format!(
                "Hi {},\n\nWe received order {}:\n{}\nTotal: {}\n\n{}",
                order.owner.name(),
                order.order_number,
                lines.join("\n"),
                order.total_amount,
                next_step,
            ),
            template: "order_placed",
        });
    }

    pub fn payment_received(&self, order: &Order) {
        self.queue(EmailMessage {
            to: order.owner.email().to_string(),
            subject: format!("Payment received for order {}", order.order_number),
            text: format!(
                "Hi {},\n\nWe received your payment of {} for order {}. It is now being processed.",
                order.owner.name(),
                order.total_amount,
                order.order_number,
            ),
            template: "payment_received",
        });
    }

    pub fn slip_rejected(&self, order: &Order) {
        let notes = order.payment_notes.as_deref().unwrap_or("No reason given.");
        self.queue(EmailMessage {
            to: order.owner.email().to_string(),
            subject: format!("Payment slip for order {} was not accepted", order.order_number),
            text: format!(
                "Hi {},\n\nWe could not verify the payment slip for order {}.\nReviewer notes: {}\n\nThe order will not be fulfilled. Reply to this email or contact us if you believe this is a mistake.",
                order.owner.name(),
                order.order_number,
                notes,
            ),
            template: "slip_rejected",
        });
    }

    pub fn contact_received(&self, message: &ContactMessage) {
        self.queue(EmailMessage {
            to: self.shop_email.clone(),
            subject: format!("Contact form: {}", message.subject),
            text: format!(
                "From: {} <{}>\n\n{}",
                message.name,
                message.email.as_str(),
                message.message
            ),
            template: "contact",
        });
    }

    fn queue(&self, message: EmailMessage) {
        tracing::debug!(to = %message.to, template = message.template, "queueing email");
        self.mailer.do_send(SendEmail(message));
    }
}
