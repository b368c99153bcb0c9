//! Spending and debt handlers

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{Datelike, Duration};
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote};
use crate::db::{TransactionCategory, TransactionType};
use crate::intent::{IntentResult, UserIntent};
use crate::Result;

/// Purchases at or above this amount always get the 48-hour rule
const BIG_PURCHASE: f64 = 1000.0;

/// Share of the last 30 days' spending that makes a purchase "big"
const BIG_SHARE: f64 = 0.2;

/// `$3,000.50` style amount
pub(crate) fn money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

fn resolve_amount(services: &Services, result: &IntentResult) -> Option<f64> {
    result
        .entity("amount")
        .and_then(|a| a.trim().trim_start_matches('$').replace(',', "").parse().ok())
        .or_else(|| services.parser.amount(&result.raw_message))
        .filter(|a: &f64| a.is_finite() && *a > 0.0)
}

/// Whether a purchase should wait 48 hours
fn needs_cooling_off(amount: f64, recent_spending: f64) -> bool {
    amount >= BIG_PURCHASE || (recent_spending > 0.0 && amount > recent_spending * BIG_SHARE)
}

pub struct ExpenseLogHandler;

#[async_trait]
impl IntentHandler for ExpenseLogHandler {
    fn name(&self) -> &'static str {
        "expense_log"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ExpenseLog
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let Some(amount) = resolve_amount(services, result) else {
            return Ok(HandlerResponse::failure(
                "💸 ¿Cuánto gastaste?\n\nEjemplo: \"Gasté $250 en comida\"",
            ));
        };
        let category = result
            .entity("category")
            .and_then(|c| c.parse::<TransactionCategory>().ok())
            .unwrap_or_else(|| services.parser.expense_category(&result.raw_message));

        let today = ctx.today();
        let tx = services.finance.log_transaction(
            today,
            amount,
            TransactionType::Expense,
            category,
            Some(result.raw_message.trim()),
        )?;
        let month_start = today.with_day(1).unwrap_or(today);
        let month_total = services.finance.spending_since(month_start)?;
        tracing::info!(tx_id = %tx.id, category = category.as_str(), "expense logged");

        Ok(HandlerResponse::new(format!(
            "💸 <b>Gasto registrado</b>\n\n{}: {}\n<i>{}</i>\n\n📊 Este mes: {}",
            category.label(),
            money(amount),
            quote(&result.raw_message, 80),
            money(month_total)
        ))
        .with_data(json!({ "transaction_id": tx.id, "amount": amount, "category": category })))
    }
}

/// Reflective questions before a purchase
pub struct ExpenseAnalyzeHandler;

#[async_trait]
impl IntentHandler for ExpenseAnalyzeHandler {
    fn name(&self) -> &'static str {
        "expense_analyze"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ExpenseAnalyze
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let recent = services
            .finance
            .spending_since(ctx.today() - Duration::days(30))?;
        let amount = resolve_amount(services, result);
        let debts = services.finance.debt_summary()?;

        let mut message = String::from("🤔 <b>Antes de comprar...</b>\n\n");
        if let Some(amount) = amount {
            let _ = writeln!(message, "💰 Monto: <b>{}</b>", money(amount));
            if recent > 0.0 {
                let _ = writeln!(
                    message,
                    "📊 Equivale al {:.0}% de lo que gastaste en 30 días ({})",
                    amount / recent * 100.0,
                    money(recent)
                );
            }
            message.push('\n');
        }

        message.push_str(
            "Pregúntate:\n\
             • ¿Lo necesito o solo lo quiero?\n\
             • ¿Lo usaré en los próximos 30 días?\n\
             • ¿Tengo algo que cumpla la misma función?\n\
             • ¿Puedo pagarlo sin usar crédito?\n",
        );
        if debts.count > 0 {
            let _ = writeln!(
                message,
                "\n💳 Tienes {} en deudas activas. ¿Este dinero no adelantaría un pago?",
                money(debts.total)
            );
        }

        let wait = amount.is_some_and(|a| needs_cooling_off(a, recent));
        if wait {
            message.push_str(
                "\n⏳ <b>Regla de 48 horas:</b> espera dos días antes de decidir. Si aún lo quieres, cómpralo sin culpa.",
            );
        }

        Ok(HandlerResponse::new(message).with_data(json!({
            "amount": amount,
            "spending_30d": recent,
            "wait_48h": wait,
        })))
    }
}

pub struct DebtQueryHandler;

#[async_trait]
impl IntentHandler for DebtQueryHandler {
    fn name(&self) -> &'static str {
        "debt_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::DebtQuery
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let debts = services.finance.active_debts()?;
        if debts.is_empty() {
            return Ok(HandlerResponse::new(
                "💳 No tienes deudas registradas. ¡Excelente!",
            )
            .with_data(json!({ "count": 0 })));
        }
        let summary = services.finance.debt_summary()?;

        let mut message = String::from("💳 <b>Resumen de Deudas</b>\n\n");
        for debt in &debts {
            let _ = write!(
                message,
                "• <b>{}</b> ({}): {} · {:.0}% pagado",
                quote(&debt.name, 40),
                quote(&debt.creditor, 30),
                money(debt.current_amount),
                debt.paid_percent()
            );
            if let Some(day) = debt.payment_day {
                let _ = write!(message, " · paga el día {day}");
            }
            message.push('\n');
        }
        let _ = write!(
            message,
            "\n💰 Total: <b>{}</b>\n📆 Pagos mínimos: {}",
            money(summary.total),
            money(summary.minimum_payments)
        );

        Ok(HandlerResponse::new(message).with_data(json!({
            "count": summary.count,
            "total": summary.total,
            "minimum_payments": summary.minimum_payments,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(3000.5), "$3,000.50");
        assert_eq!(money(999.0), "$999.00");
        assert_eq!(money(1_234_567.891), "$1,234,567.89");
        assert_eq!(money(-20.0), "-$20.00");
    }

    #[test]
    fn cooling_off_rule() {
        assert!(needs_cooling_off(1000.0, 50_000.0));
        assert!(needs_cooling_off(300.0, 1000.0));
        assert!(!needs_cooling_off(100.0, 1000.0));
        assert!(!needs_cooling_off(500.0, 0.0));
    }

    #[tokio::test]
    async fn logs_expense_with_category() {
        let services = services();
        let result = IntentResult::new(UserIntent::ExpenseLog, 0.9, "gasté 250 pesos en uber")
            .with_entity("amount", "250");

        let response = ExpenseLogHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.success);
        assert!(response.message.contains("$250.00"));
        let total = services.finance.spending_since(ctx().today()).unwrap();
        assert!((total - 250.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_amount_asks() {
        let result = IntentResult::new(UserIntent::ExpenseLog, 0.9, "gasté en comida");
        let response = ExpenseLogHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn big_purchase_gets_48_hour_rule() {
        let result = IntentResult::new(UserIntent::ExpenseAnalyze, 0.8, "vale la pena $3,000?")
            .with_entity("amount", "3000");

        let response = ExpenseAnalyzeHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(response.message.contains("Regla de 48 horas"));
        assert_eq!(response.data.unwrap()["wait_48h"], true);
    }

    #[tokio::test]
    async fn debts_summary() {
        let services = services();
        let empty = DebtQueryHandler
            .handle(&services, &ctx(), &IntentResult::new(UserIntent::DebtQuery, 0.9, "deudas"))
            .await
            .unwrap();
        assert!(empty.message.contains("No tienes deudas"));

        services.finance.add_debt("Tarjeta", "Banco", 5000.0, 500.0, Some(15)).unwrap();
        let response = DebtQueryHandler
            .handle(&services, &ctx(), &IntentResult::new(UserIntent::DebtQuery, 0.9, "deudas"))
            .await
            .unwrap();
        assert!(response.message.contains("Resumen de Deudas"));
        assert!(response.message.contains("$5,000.00"));
    }
}
