use crate::domain::lifecycle::PaymentStatus;
use crate::domain::payment::PaymentDetails;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PaymentRow<'a> {
    payment: u64,
    application: u64,
    user: &'a str,
    amount: Decimal,
    currency: &'a str,
    status: PaymentStatus,
    installments: usize,
    scheduled: Decimal,
}

/// Writes the end-of-run payments report as CSV, amounts in major units.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: &[PaymentDetails]) -> Result<()> {
        if payments.is_empty() {
            // serde-driven headers are only written with the first record.
            self.writer.write_record([
                "payment",
                "application",
                "user",
                "amount",
                "currency",
                "status",
                "installments",
                "scheduled",
            ])?;
        }
        for details in payments {
            let payment = &details.payment;
            let scheduled = details
                .installments
                .iter()
                .fold(Decimal::new(0, 2), |acc, i| acc + i.amount.to_major());
            self.writer.serialize(PaymentRow {
                payment: payment.id.value(),
                application: payment.application_id.value(),
                user: &payment.user_id,
                amount: payment.amount.to_major(),
                currency: payment.currency.as_str(),
                status: payment.status,
                installments: details.installments.len(),
                scheduled,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
