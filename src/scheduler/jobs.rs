//! Scheduled jobs
//!
//! Each job reads the store, decides whether the owner should hear about
//! something and sends at most a handful of messages. Jobs share nothing but
//! the database.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use serde::Serialize;

use crate::db::{TaskFilter, TaskPriority, TransactionType};
use crate::handlers::{
    Services, WEEKLY_TARGET, complete_buttons, money, next_study_project, quote, reminder_keyboard,
    short_date, task_line,
};
use crate::telegram::{InlineKeyboard, Messenger};
use crate::{Error, Result};

/// Named jobs and their default schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    MorningBriefing,
    ReminderDispatcher,
    PersistentReminders,
    GymReminder,
    NutritionReminder,
    StudyReminder,
    WeeklyReview,
    PrePayday,
    PostPayday,
}

impl Job {
    pub const ALL: [Self; 9] = [
        Self::MorningBriefing,
        Self::ReminderDispatcher,
        Self::PersistentReminders,
        Self::GymReminder,
        Self::NutritionReminder,
        Self::StudyReminder,
        Self::WeeklyReview,
        Self::PrePayday,
        Self::PostPayday,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MorningBriefing => "morning_briefing",
            Self::ReminderDispatcher => "reminder_dispatcher",
            Self::PersistentReminders => "persistent_reminders",
            Self::GymReminder => "gym_reminder",
            Self::NutritionReminder => "nutrition_reminder",
            Self::StudyReminder => "study_reminder",
            Self::WeeklyReview => "weekly_review",
            Self::PrePayday => "pre_payday",
            Self::PostPayday => "post_payday",
        }
    }

    /// Cron expression, evaluated in the assistant's offset
    #[must_use]
    pub const fn schedule(self) -> &'static str {
        match self {
            Self::MorningBriefing => "30 6 * * *",
            Self::ReminderDispatcher => "*/2 * * * *",
            Self::PersistentReminders => "*/30 * * * *",
            Self::GymReminder => "15,30,45 7 * * 1-5",
            Self::NutritionReminder => "0 21 * * *",
            Self::StudyReminder => "30 17 * * *",
            Self::WeeklyReview => "0 10 * * 0",
            Self::PrePayday => "0 9 13,28 * *",
            Self::PostPayday => "0 18 15,30 * *",
        }
    }

    /// Notification class used for weekend mode
    #[must_use]
    pub const fn notification(self) -> NotificationKind {
        match self {
            Self::MorningBriefing => NotificationKind::MorningBriefing,
            Self::ReminderDispatcher => NotificationKind::Reminder,
            Self::PersistentReminders => NotificationKind::Proactive,
            Self::GymReminder => NotificationKind::Gym,
            Self::NutritionReminder => NotificationKind::Nutrition,
            Self::StudyReminder => NotificationKind::Study,
            Self::WeeklyReview | Self::PrePayday | Self::PostPayday => NotificationKind::Report,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Job {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|job| job.name() == s)
            .ok_or_else(|| Error::NotFound(format!("job '{s}'")))
    }
}

/// Kinds of outbound notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    MorningBriefing,
    Reminder,
    Deadline,
    Critical,
    Checkin,
    Gym,
    Nutrition,
    Study,
    Proactive,
    Report,
}

impl NotificationKind {
    /// Kinds muted on weekends
    #[must_use]
    pub const fn workday_only(self) -> bool {
        matches!(
            self,
            Self::Checkin | Self::Gym | Self::Nutrition | Self::Study | Self::Proactive
        )
    }
}

#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekend mode: routine nudges only go out Monday to Friday
#[must_use]
pub fn should_send_notification<Tz: TimeZone>(kind: NotificationKind, at: &DateTime<Tz>) -> bool {
    !kind.workday_only() || is_workday(at.date_naive())
}

/// Night (22:00-07:00) and lunch (12:30-14:00)
#[must_use]
pub fn is_quiet_hours<Tz: TimeZone>(at: &DateTime<Tz>) -> bool {
    let minutes = at.hour() * 60 + at.minute();
    !(7 * 60..22 * 60).contains(&minutes) || (12 * 60 + 30..14 * 60).contains(&minutes)
}

/// Everything a job run needs
pub struct JobContext<'a> {
    pub services: &'a Services,
    pub messenger: &'a dyn Messenger,
    /// Owner chat for proactive messages
    pub chat_id: Option<i64>,
    /// Local time of the run
    pub now: DateTime<FixedOffset>,
}

impl JobContext<'_> {
    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    async fn notify(&self, text: &str, keyboard: Option<&InlineKeyboard>) -> Result<JobOutcome> {
        let Some(chat_id) = self.chat_id else {
            return Ok(JobOutcome::Skipped("no chat configured"));
        };
        self.messenger.send(chat_id, text, keyboard).await?;
        Ok(JobOutcome::Sent(1))
    }
}

/// What a run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum JobOutcome {
    /// Messages delivered
    Sent(usize),
    /// Nothing to do, with the reason
    Skipped(&'static str),
}

/// Run one job to completion
///
/// # Errors
///
/// Returns the first store or delivery error
pub async fn run(job: Job, ctx: &JobContext<'_>) -> Result<JobOutcome> {
    if !should_send_notification(job.notification(), &ctx.now) {
        return Ok(JobOutcome::Skipped("weekend"));
    }
    match job {
        Job::MorningBriefing => morning_briefing(ctx).await,
        Job::ReminderDispatcher => dispatch_reminders(ctx).await,
        Job::PersistentReminders => persistent_reminders(ctx).await,
        Job::GymReminder => gym_reminder(ctx).await,
        Job::NutritionReminder => nutrition_reminder(ctx).await,
        Job::StudyReminder => study_reminder(ctx).await,
        Job::WeeklyReview => weekly_review(ctx).await,
        Job::PrePayday => pre_payday(ctx).await,
        Job::PostPayday => post_payday(ctx).await,
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const fn motivation(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "¡Inicio de semana! Enfócate en las prioridades.",
        Weekday::Tue => "Martes de acción. Mantén el momentum.",
        Weekday::Wed => "Mitad de semana. Ya casi llegamos al viernes.",
        Weekday::Thu => "Jueves productivo. Un día más y es viernes.",
        Weekday::Fri => "¡Viernes! Cierra la semana con fuerza.",
        Weekday::Sat => "Sábado de descanso... o de ponerse al día.",
        Weekday::Sun => "Domingo. Prepárate para la semana que viene.",
    }
}

/// UTC bounds of the local day containing `now`
fn day_bounds(now: &DateTime<FixedOffset>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = now
        .offset()
        .from_local_datetime(&now.date_naive().and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| Error::Scheduler("ambiguous local midnight".to_string()))?
        .with_timezone(&Utc);
    Ok((start, start + Duration::days(1)))
}

async fn morning_briefing(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let today = ctx.today();
    let weekday = today.weekday();

    if !is_workday(today) {
        let text = format!(
            "<b>Buenos días, {}</b>\n\nEs fin de semana. Hoy toca descanso.\n\nSi tienes algo pendiente urgente, dímelo.\nDe lo contrario, disfruta tu día.",
            weekday_name(weekday)
        );
        return ctx.notify(&text, None).await;
    }

    let pending = ctx.services.tasks.list(&TaskFilter::pending())?;
    let overdue: Vec<_> = pending.iter().filter(|t| t.is_overdue(today)).collect();
    let due_today: Vec<_> = pending.iter().filter(|t| t.due_date == Some(today)).collect();

    let mut text = format!(
        "☀️ <b>Buenos días! - {} {}</b>\n\n",
        weekday_name(weekday),
        short_date(today)
    );

    if !overdue.is_empty() {
        text.push_str("⚠️ <b>Pendientes de ayer:</b>\n");
        for task in overdue.iter().take(3) {
            let _ = writeln!(text, "  • {}", task_line(task, today));
        }
        text.push('\n');
    }

    if due_today.is_empty() {
        text.push_str("📋 <b>No hay tareas programadas para hoy.</b>\n");
        let spare: Vec<_> = pending
            .iter()
            .filter(|t| t.due_date.is_none_or(|d| d > today))
            .take(3)
            .collect();
        if !spare.is_empty() {
            text.push_str("\nPodrías trabajar en alguna de estas:\n");
            for task in spare {
                let _ = writeln!(text, "  • {}", quote(&task.title, 60));
            }
        }
    } else {
        text.push_str("📋 <b>Hoy tienes:</b>\n");
        for task in &due_today {
            let _ = writeln!(text, "  {} {}", task.priority.emoji(), quote(&task.title, 60));
        }
    }

    if let Some(chat_id) = ctx.chat_id {
        let (start, end) = day_bounds(&ctx.now)?;
        let reminders: Vec<_> = ctx
            .services
            .reminders
            .between(start, end)?
            .into_iter()
            .filter(|r| r.chat_id == chat_id)
            .collect();
        if !reminders.is_empty() {
            text.push_str("\n⏰ <b>Recordatorios:</b>\n");
            for reminder in &reminders {
                let local = reminder.remind_at.with_timezone(ctx.now.offset());
                let _ = writeln!(
                    text,
                    "  • {} {}",
                    local.format("%H:%M"),
                    quote(&reminder.message, 60)
                );
            }
        }
    }

    let _ = write!(text, "\n💪 {}", motivation(weekday));

    let keyboard = complete_buttons(due_today.iter().copied().take(5));
    let keyboard = (!keyboard.inline_keyboard.is_empty()).then_some(keyboard);
    ctx.notify(&text, keyboard.as_ref()).await
}

/// Deliver due reminders to the chat each belongs to
async fn dispatch_reminders(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let now = ctx.now.with_timezone(&Utc);
    let due = ctx.services.reminders.due(now)?;
    if due.is_empty() {
        return Ok(JobOutcome::Skipped("no reminders due"));
    }

    let mut sent = 0;
    for reminder in due {
        let mut text = format!(
            "{} <b>Recordatorio</b>\n\n<b>{}</b>",
            reminder.priority.emoji(),
            quote(&reminder.message, 300)
        );
        if reminder.snooze_count > 0 {
            let _ = write!(
                text,
                "\n\n⚠️ <i>Recordatorio #{}</i>",
                reminder.snooze_count + 1
            );
        }

        let keyboard = reminder_keyboard(&reminder);
        if let Err(e) = ctx.messenger.send(reminder.chat_id, &text, Some(&keyboard)).await {
            tracing::warn!(
                reminder_id = %reminder.id,
                error = %e,
                "reminder delivery failed, will retry"
            );
            continue;
        }
        ctx.services.reminders.mark_sent(&reminder.id, now)?;
        sent += 1;
    }

    tracing::info!(sent, "reminders dispatched");
    Ok(JobOutcome::Sent(sent))
}

/// Nag about urgent open tasks during working hours
async fn persistent_reminders(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    if !(9..18).contains(&ctx.now.hour()) || is_quiet_hours(&ctx.now) {
        return Ok(JobOutcome::Skipped("outside working hours"));
    }

    let today = ctx.today();
    let urgent: Vec<_> = ctx
        .services
        .tasks
        .list(&TaskFilter::pending())?
        .into_iter()
        .filter(|t| t.priority == TaskPriority::Urgent)
        .collect();
    if urgent.is_empty() {
        return Ok(JobOutcome::Skipped("nothing urgent"));
    }

    let mut text = String::from("🔴 <b>Tareas urgentes pendientes</b>\n\n");
    for task in urgent.iter().take(5) {
        let _ = writeln!(text, "{}", task_line(task, today));
    }
    if urgent.len() > 5 {
        let _ = writeln!(text, "… y {} más", urgent.len() - 5);
    }
    text.push_str("\n¿Cuál atacas ahora?");

    let keyboard = complete_buttons(urgent.iter().take(5));
    ctx.notify(&text, Some(&keyboard)).await
}

async fn gym_reminder(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    if ctx.services.fitness.has_workout_on(ctx.today())? {
        return Ok(JobOutcome::Skipped("workout already logged"));
    }

    let text = match ctx.now.minute() {
        0..30 => {
            "💪 <b>Buenos días!</b>\n\n¿Listo para el gym?\nRecuerda: la consistencia es más importante que la intensidad."
        }
        30..45 => "🏋️ <b>Recordatorio de Gym</b>\n\nYa son las 7:30. El gym te espera.\n¿Vas a ir hoy?",
        _ => {
            "⚡ <b>¡Último aviso!</b>\n\nSon las 7:45. Si no sales ahora, se te hará tarde.\nPiensa en tus objetivos. ¿Qué decides?"
        }
    };
    ctx.notify(text, None).await
}

const fn nutrition_tip(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "💡 Tip: El lunes es buen día para empezar con buenos hábitos.",
        Weekday::Tue => "💡 Tip: Recuerda hidratarte bien durante el día.",
        Weekday::Wed => "💡 Tip: La proteína ayuda a mantener la masa muscular.",
        Weekday::Thu => "💡 Tip: Los vegetales son tus amigos.",
        Weekday::Fri => "💡 Tip: Si vas a comer fuera el finde, planifica.",
        Weekday::Sat => "💡 Tip: Fin de semana no significa excesos.",
        Weekday::Sun => "💡 Tip: Prepara tus comidas de la semana.",
    }
}

async fn nutrition_reminder(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let today = ctx.today();
    let meals = ctx.services.fitness.meals_on(today)?;
    if meals.len() >= 2 {
        return Ok(JobOutcome::Skipped("meals already logged"));
    }

    let mut text = String::from("🍽️ <b>Registro de Nutrición</b>\n\n¿Cómo fue tu alimentación hoy?\n\n");
    if let Some(meal) = meals.first() {
        let _ = writeln!(
            text,
            "Ya registraste: {} ({})\n",
            meal.meal_type.label(),
            quote(&meal.description, 40)
        );
    }
    text.push_str("Cuéntame qué comiste en:\n• Desayuno\n• Comida\n• Cena\n• Snacks\n\n");
    text.push_str(nutrition_tip(today.weekday()));
    ctx.notify(&text, None).await
}

async fn study_reminder(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let mut text = String::from("📚 <b>Hora de Estudio</b>\n\n");
    if ctx.today().weekday() == Weekday::Fri {
        text.push_str("🎉 ¡Último día laboral! Una hora de estudio y listo.\n\n");
    }

    match next_study_project(ctx.services)? {
        Some(project) => {
            let _ = write!(
                text,
                "📖 <b>Sugerencia:</b> {}\n{} {}%\n\n",
                quote(&project.name, 60),
                project.progress_bar(),
                project.progress
            );
            text.push_str(if project.progress < 50 {
                "💡 <i>Todavía falta la mitad. Una sesión corta suma.</i>"
            } else {
                "💡 <i>Continúa donde lo dejaste.</i>"
            });
        }
        None => text.push_str(
            "No hay proyectos de estudio activos.\nCrea uno con \"Proyecto: curso de ...\" y lo tendré en cuenta.",
        ),
    }
    ctx.notify(&text, None).await
}

async fn weekly_review(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let today = ctx.today();
    let week_start = today - Duration::days(6);
    let services = ctx.services;

    let completed = services
        .tasks
        .completed_since(ctx.now.with_timezone(&Utc) - Duration::days(7))?;
    let workouts = services.fitness.workouts_since(week_start)?;
    let meal_days: BTreeSet<NaiveDate> = services
        .fitness
        .meals_since(week_start)?
        .into_iter()
        .map(|m| m.date)
        .collect();
    let transactions = services.finance.transactions_since(week_start)?;
    let total = |kind: TransactionType| -> f64 {
        transactions
            .iter()
            .filter(|t| t.tx_type == kind)
            .map(|t| t.amount)
            .sum()
    };
    let income = total(TransactionType::Income);
    let spent = total(TransactionType::Expense);

    let mut text = format!(
        "📊 <b>Revisión Semanal</b>\n{} - {}\n\n",
        week_start.format("%d/%m"),
        today.format("%d/%m/%Y")
    );

    text.push_str("✅ <b>Productividad</b>\n");
    let _ = writeln!(text, "• Tareas completadas: {}\n", completed.len());

    text.push_str("🏋️ <b>Gym</b>\n");
    let gym_mark = if workouts.len() >= WEEKLY_TARGET { "✅" } else { "⚠️" };
    let _ = writeln!(text, "{gym_mark} Sesiones: {}/{WEEKLY_TARGET}", workouts.len());
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for workout in &workouts {
        *by_type.entry(workout.workout_type.label()).or_default() += 1;
    }
    if !by_type.is_empty() {
        let types: Vec<String> = by_type.iter().map(|(t, c)| format!("{t}: {c}")).collect();
        let _ = writeln!(text, "• Tipos: {}", types.join(", "));
    }
    text.push('\n');

    text.push_str("🍽️ <b>Nutrición</b>\n");
    let meal_mark = if meal_days.len() >= 5 { "✅" } else { "⚠️" };
    let _ = writeln!(text, "{meal_mark} Días registrados: {}/7\n", meal_days.len());

    text.push_str("💰 <b>Finanzas</b>\n");
    let _ = writeln!(text, "• Ingresos: {}", money(income));
    let _ = writeln!(text, "• Gastos: {}", money(spent));
    let balance = income - spent;
    let _ = writeln!(
        text,
        "{} Balance: {}",
        if balance > 0.0 { "📈" } else { "📉" },
        money(balance)
    );
    if let Some((category, amount)) = services
        .finance
        .spending_by_category(week_start)?
        .into_iter()
        .next()
    {
        let _ = writeln!(text, "• Mayor gasto: {} ({})", category.label(), money(amount));
    }

    text.push_str(
        "\n💭 <b>Reflexión</b>\n¿Qué funcionó bien esta semana?\n¿Qué puedo mejorar?\n¿Cuál es mi foco para la próxima semana?",
    );
    ctx.notify(&text, None).await
}

async fn pre_payday(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    let today = ctx.today();
    let fortnight = if today.day() <= 15 { "Q1" } else { "Q2" };
    let month = MONTHS[today.month0() as usize];

    let mut text = format!("💰 <b>Plan de Quincena</b>\n{fortnight} - {month}\n\n");

    let debts = ctx.services.finance.active_debts()?;
    if debts.is_empty() {
        text.push_str("💳 Sin deudas activas. Separa primero tu ahorro.\n\n");
    } else {
        let summary = ctx.services.finance.debt_summary()?;
        text.push_str("<b>💳 Pagos Mínimos Deuda:</b>\n");
        for debt in &debts {
            let _ = writeln!(text, "• {}: {}", quote(&debt.name, 40), money(debt.minimum_payment));
        }
        let _ = writeln!(text, "<b>Total:</b> {}\n", money(summary.minimum_payments));

        let priority = debts.iter().max_by(|a, b| {
            a.interest_rate
                .unwrap_or(0.0)
                .total_cmp(&b.interest_rate.unwrap_or(0.0))
                .then_with(|| b.current_amount.total_cmp(&a.current_amount))
        });
        if let Some(debt) = priority {
            let _ = write!(text, "🎯 Si te sobra, abona extra a <b>{}</b>", quote(&debt.name, 40));
            if let Some(rate) = debt.interest_rate {
                let _ = write!(text, " (tasa {rate:.1}%)");
            }
            text.push_str("\n\n");
        }
        let _ = writeln!(text, "<b>📉 Saldo total:</b> {}\n", money(summary.total));
    }

    let spent = ctx.services.finance.spending_since(today - Duration::days(15))?;
    let _ = writeln!(text, "📊 Gastaste {} en la última quincena.", money(spent));
    text.push_str("\n¿Cómo quieres proceder?");
    ctx.notify(&text, None).await
}

async fn post_payday(ctx: &JobContext<'_>) -> Result<JobOutcome> {
    ctx.notify(
        "✅ <b>Día de Quincena</b>\n\n\
         ¿Ya recibiste tu quincena?\n\n\
         📝 Por favor registra:\n\
         1. Monto recibido (si difiere de lo esperado)\n\
         2. Pagos realizados\n\
         3. Cualquier gasto extra\n\n\
         Por ejemplo: \"Gasté $1,200 en la tarjeta\"\n\n\
         <i>O simplemente cuéntame qué pagaste y yo lo registro</i>",
        None,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::db::{NewTask, TransactionCategory, WorkoutFeeling, WorkoutType};
    use crate::handlers::tests::services;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(i64, String, bool)>>,
    }

    impl Outbox {
        fn messages(&self) -> Vec<(i64, String, bool)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for Outbox {
        async fn send(
            &self,
            chat_id: i64,
            text: &str,
            keyboard: Option<&InlineKeyboard>,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id, text.to_string(), keyboard.is_some()));
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    // 2026-03-02 is a Monday, 2026-03-07 a Saturday
    const MONDAY: &str = "2026-03-02T06:30:00-06:00";
    const SATURDAY: &str = "2026-03-07T06:30:00-06:00";

    fn context<'a>(services: &'a Services, outbox: &'a Outbox, now: &str) -> JobContext<'a> {
        JobContext {
            services,
            messenger: outbox,
            chat_id: Some(42),
            now: at(now),
        }
    }

    #[test]
    fn names_round_trip() {
        for job in Job::ALL {
            assert_eq!(job.name().parse::<Job>().unwrap(), job);
            assert!(crate::scheduler::CronExpr::parse(job.schedule()).is_ok());
        }
        assert!(matches!("nope".parse::<Job>(), Err(Error::NotFound(_))));
    }

    #[test]
    fn weekend_mode() {
        let saturday = at(SATURDAY);
        let monday = at(MONDAY);
        assert!(!should_send_notification(NotificationKind::Gym, &saturday));
        assert!(!should_send_notification(NotificationKind::Proactive, &saturday));
        assert!(should_send_notification(NotificationKind::Gym, &monday));
        assert!(should_send_notification(NotificationKind::MorningBriefing, &saturday));
        assert!(should_send_notification(NotificationKind::Reminder, &saturday));
        assert!(should_send_notification(NotificationKind::Critical, &saturday));
    }

    #[test]
    fn quiet_hours() {
        assert!(is_quiet_hours(&at("2026-03-02T23:00:00-06:00")));
        assert!(is_quiet_hours(&at("2026-03-02T06:59:00-06:00")));
        assert!(is_quiet_hours(&at("2026-03-02T13:00:00-06:00")));
        assert!(!is_quiet_hours(&at("2026-03-02T10:00:00-06:00")));
        assert!(!is_quiet_hours(&at("2026-03-02T14:00:00-06:00")));
    }

    #[tokio::test]
    async fn weekend_briefing_is_light() {
        let services = services();
        let outbox = Outbox::default();
        let outcome = run(Job::MorningBriefing, &context(&services, &outbox, SATURDAY))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Sent(1));
        let sent = outbox.messages();
        assert!(sent[0].1.starts_with("<b>Buenos días, Sábado</b>"));
        assert!(sent[0].1.contains("Es fin de semana"));
    }

    #[tokio::test]
    async fn workday_briefing_lists_tasks() {
        let services = services();
        let today = at(MONDAY).date_naive();
        let mut due = NewTask::new("entregar reporte");
        due.due_date = Some(today);
        services.tasks.create(&due).unwrap();
        let mut late = NewTask::new("pagar luz");
        late.due_date = Some(today - Duration::days(1));
        services.tasks.create(&late).unwrap();

        let outbox = Outbox::default();
        run(Job::MorningBriefing, &context(&services, &outbox, MONDAY))
            .await
            .unwrap();

        let (chat, text, has_keyboard) = outbox.messages().remove(0);
        assert_eq!(chat, 42);
        assert!(text.contains("Buenos días! - Lunes 02/03"));
        assert!(text.contains("Pendientes de ayer"));
        assert!(text.contains("pagar luz"));
        assert!(text.contains("Hoy tienes"));
        assert!(text.contains("entregar reporte"));
        assert!(has_keyboard);
    }

    #[tokio::test]
    async fn dispatcher_sends_and_marks() {
        let services = services();
        let now = at("2026-03-02T10:00:00-06:00");
        let reminder = services
            .reminders
            .create(7, "llamar al banco", &(now - Duration::minutes(1)), TaskPriority::Normal, None)
            .unwrap();
        services
            .reminders
            .create(7, "más tarde", &(now + Duration::hours(1)), TaskPriority::Normal, None)
            .unwrap();

        let outbox = Outbox::default();
        let ctx = JobContext {
            chat_id: None,
            ..context(&services, &outbox, "2026-03-02T10:00:00-06:00")
        };
        assert_eq!(run(Job::ReminderDispatcher, &ctx).await.unwrap(), JobOutcome::Sent(1));

        let sent = outbox.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert!(sent[0].1.contains("llamar al banco"));
        assert!(sent[0].2);
        let stored = services.reminders.get(&reminder.id).unwrap().unwrap();
        assert!(!stored.is_due(now.with_timezone(&Utc)));

        assert_eq!(
            run(Job::ReminderDispatcher, &ctx).await.unwrap(),
            JobOutcome::Skipped("no reminders due")
        );
    }

    #[tokio::test]
    async fn gym_skipped_after_workout_and_on_weekends() {
        let services = services();
        let outbox = Outbox::default();
        let weekend = context(&services, &outbox, "2026-03-07T07:15:00-06:00");
        assert_eq!(
            run(Job::GymReminder, &weekend).await.unwrap(),
            JobOutcome::Skipped("weekend")
        );

        let monday = context(&services, &outbox, "2026-03-02T07:45:00-06:00");
        assert_eq!(run(Job::GymReminder, &monday).await.unwrap(), JobOutcome::Sent(1));
        assert!(outbox.messages()[0].1.contains("Último aviso"));

        services
            .fitness
            .log_workout(monday.today(), WorkoutType::Legs, WorkoutFeeling::Strong, &[], None)
            .unwrap();
        assert_eq!(
            run(Job::GymReminder, &monday).await.unwrap(),
            JobOutcome::Skipped("workout already logged")
        );
    }

    #[tokio::test]
    async fn persistent_reminders_only_for_urgent_in_hours() {
        let services = services();
        let outbox = Outbox::default();
        let mut task = NewTask::new("arreglar producción");
        task.priority = TaskPriority::Urgent;
        services.tasks.create(&task).unwrap();

        let evening = context(&services, &outbox, "2026-03-02T19:00:00-06:00");
        assert_eq!(
            run(Job::PersistentReminders, &evening).await.unwrap(),
            JobOutcome::Skipped("outside working hours")
        );

        let morning = context(&services, &outbox, "2026-03-02T10:00:00-06:00");
        assert_eq!(run(Job::PersistentReminders, &morning).await.unwrap(), JobOutcome::Sent(1));
        assert!(outbox.messages()[0].1.contains("arreglar producción"));
    }

    #[tokio::test]
    async fn weekly_review_summarizes() {
        let services = services();
        let now = at("2026-03-08T10:00:00-06:00");
        services
            .finance
            .log_transaction(
                now.date_naive(),
                300.0,
                TransactionType::Expense,
                TransactionCategory::Food,
                None,
            )
            .unwrap();

        let outbox = Outbox::default();
        run(Job::WeeklyReview, &context(&services, &outbox, "2026-03-08T10:00:00-06:00"))
            .await
            .unwrap();
        let text = &outbox.messages()[0].1;
        assert!(text.contains("Revisión Semanal"));
        assert!(text.contains("Gastos: $300.00"));
        assert!(text.contains(&format!("Sesiones: 0/{WEEKLY_TARGET}")));
    }

    #[tokio::test]
    async fn without_chat_jobs_skip() {
        let services = services();
        let outbox = Outbox::default();
        let ctx = JobContext {
            chat_id: None,
            ..context(&services, &outbox, MONDAY)
        };
        assert_eq!(
            run(Job::PostPayday, &ctx).await.unwrap(),
            JobOutcome::Skipped("no chat configured")
        );
        assert!(outbox.messages().is_empty());
    }
}
