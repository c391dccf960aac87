use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Weekday};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use calendar_cell::{AvailabilityService, Slot, WeeklySchedule};
use locale_cell::services::intent::{CONFIRM_PREFIX, DATE_PREFIX, LANGUAGE_PREFIX, MENU_PREFIX, NAV_PREFIX, TIME_PREFIX};
use locale_cell::{
    is_button_value, Escape, Intent, IntentClassifier, Language, LanguageResolution, LocaleResolver, MessageKey,
};
use shared_config::AppConfig;
use shared_database::{AppointmentStore, PatientStore};
use shared_models::{Appointment, NewAppointment, NewPatient, Patient};
use shared_utils::{Clock, SystemClock};

use crate::models::{BookingDraft, BookingError, Choice, ConversationState, Flow, Payload, Step};
use crate::services::locks::UserLocks;
use crate::services::notifier::{notifier_from_config, Notifier};
use crate::services::store::ConversationStore;
use crate::services::validation;

const DEFAULT_BOOKING_WINDOW_DAYS: usize = 7;

/// Drives one user's conversation a message at a time.
///
/// Each message is a read-modify-write of that user's `ConversationState`,
/// serialized per user. While a flow is active the message answers the
/// current step; free-text commands are only looked for when idle. Cancel
/// and menu work everywhere.
pub struct BookingStateMachine {
    availability: Arc<AvailabilityService>,
    appointments: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientStore>,
    conversations: Arc<dyn ConversationStore>,
    locale: Arc<LocaleResolver>,
    intents: IntentClassifier,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
    clinic_target: Option<String>,
    booking_window_days: usize,
}

impl BookingStateMachine {
    pub fn new(
        availability: Arc<AvailabilityService>,
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientStore>,
        conversations: Arc<dyn ConversationStore>,
        locale: Arc<LocaleResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            availability,
            appointments,
            patients,
            conversations,
            intents: IntentClassifier::new(locale.clone()),
            locale,
            notifier,
            clock: Arc::new(SystemClock),
            locks: UserLocks::new(),
            clinic_target: None,
            booking_window_days: DEFAULT_BOOKING_WINDOW_DAYS,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        availability: Arc<AvailabilityService>,
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientStore>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self::new(
            availability,
            appointments,
            patients,
            conversations,
            Arc::new(LocaleResolver::from_config(config)),
            notifier_from_config(config),
        )
        .with_clinic_target(config.clinic_line_user_id.clone())
        .with_booking_window(config.booking_window_days)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where new-appointment notices and forwarded messages go.
    pub fn with_clinic_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.clinic_target = if target.trim().is_empty() { None } else { Some(target) };
        self
    }

    pub fn with_booking_window(mut self, days: u32) -> Self {
        self.booking_window_days = days.max(1) as usize;
        self
    }

    /// Read-only view for the messaging gateway.
    pub async fn conversation_state(&self, user_id: &str) -> Result<Option<ConversationState>, BookingError> {
        Ok(self.conversations.get_state(user_id).await?)
    }

    /// Handles one inbound message and returns the replies, in order.
    ///
    /// Always returns at least one payload: failures become a generic error
    /// message with a way back to language selection.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Vec<Payload> {
        let _guard = self.locks.acquire(user_id).await;

        let outcome = AssertUnwindSafe(self.process(user_id, text)).catch_unwind().await;
        match outcome {
            Ok(Ok(replies)) if !replies.is_empty() => replies,
            Ok(Ok(_)) => {
                warn!("No reply produced for message from {}", user_id);
                self.failure_replies(user_id).await
            }
            Ok(Err(e)) => {
                error!("Message from {} failed: {}", user_id, e);
                self.failure_replies(user_id).await
            }
            Err(_) => {
                error!("Message handler panicked for {}", user_id);
                self.failure_replies(user_id).await
            }
        }
    }

    async fn process(&self, user_id: &str, text: &str) -> Result<Vec<Payload>, BookingError> {
        let mut state = self.conversations
            .get_state(user_id)
            .await?
            .unwrap_or_else(|| {
                info!("New conversation with {}", user_id);
                ConversationState::bootstrap()
            });

        let resolution = self.resolve_language(user_id, text, &state).await;
        debug!(
            "Message from {} in {:?}/{:?}, language {} ({:?})",
            user_id, state.current_flow, state.current_step, resolution.language, resolution.origin
        );

        let replies = self.dispatch(user_id, text, &mut state, resolution).await?;

        if let Err(e) = self.conversations.set_state(user_id, &state).await {
            error!("Could not store conversation state for {}: {}", user_id, e);
        }
        Ok(replies)
    }

    async fn resolve_language(&self, user_id: &str, text: &str, state: &ConversationState) -> LanguageResolution {
        let awaiting_language = state.language.is_none();

        let detected = if !is_button_value(text) && (state.is_idle() || awaiting_language) {
            self.locale.detect(text).await
        } else {
            None
        };
        let preference = if awaiting_language {
            self.patient_preference(user_id).await
        } else {
            None
        };

        self.locale.resolve_language(state.language, preference, detected, !state.is_idle())
    }

    async fn dispatch(
        &self,
        user_id: &str,
        text: &str,
        state: &mut ConversationState,
        resolution: LanguageResolution,
    ) -> Result<Vec<Payload>, BookingError> {
        let lang = resolution.language;

        if let Some(escape) = self.intents.escape(text, lang).await {
            return Ok(self.escape(state, escape, lang).await);
        }

        if state.language.is_none()
            || matches!(state.current_flow, Flow::LanguageSelect | Flow::LanguageChange)
        {
            return self.handle_language_choice(user_id, text, state, resolution).await;
        }

        match state.current_flow {
            Flow::Booking => self.handle_booking_step(user_id, text, state, lang).await,
            Flow::TalkToClinic => Ok(self.forward_to_clinic(user_id, text, lang).await),
            _ => self.handle_idle(user_id, text, state, resolution).await,
        }
    }

    // ==========================================================================
    // TOP LEVEL
    // ==========================================================================

    async fn escape(&self, state: &mut ConversationState, escape: Escape, lang: Language) -> Vec<Payload> {
        if state.language.is_none() {
            state.enter(Flow::LanguageSelect, Step::None);
            return self.language_prompt(lang).await;
        }

        let left = state.current_flow;
        state.reset_to_idle();
        debug!("Escape {:?} from {:?}", escape, left);

        match escape {
            Escape::Language => {
                state.enter(Flow::LanguageChange, Step::None);
                self.language_prompt(lang).await
            }
            Escape::Menu => vec![self.main_menu(lang).await],
            Escape::Cancel => {
                let mut replies = Vec::new();
                match left {
                    Flow::Booking => replies.push(self.say(MessageKey::BookingCancelled, lang).await),
                    Flow::None => replies.push(self.say(MessageKey::CancelExisting, lang).await),
                    _ => {}
                }
                replies.push(self.main_menu(lang).await);
                replies
            }
        }
    }

    async fn handle_language_choice(
        &self,
        user_id: &str,
        text: &str,
        state: &mut ConversationState,
        resolution: LanguageResolution,
    ) -> Result<Vec<Payload>, BookingError> {
        if let Intent::SelectLanguage(chosen) = self.intents.classify(text, resolution.language).await {
            return Ok(self.select_language(user_id, state, chosen).await);
        }

        if state.language.is_some() {
            // Anything else from a user who already has a language is a
            // fresh top-level message.
            state.reset_to_idle();
            return self.handle_idle(user_id, text, state, resolution).await;
        }

        state.enter(Flow::LanguageSelect, Step::None);
        Ok(self.language_prompt(resolution.language).await)
    }

    async fn select_language(&self, user_id: &str, state: &mut ConversationState, chosen: Language) -> Vec<Payload> {
        state.language = Some(chosen);
        state.reset_to_idle();
        info!("User {} selected language {}", user_id, chosen);

        let confirmation = self.locale
            .render(MessageKey::LanguageSet, chosen, &[("language", chosen.native_name())])
            .await;
        vec![Payload::text(confirmation), self.main_menu(chosen).await]
    }

    async fn handle_idle(
        &self,
        user_id: &str,
        text: &str,
        state: &mut ConversationState,
        resolution: LanguageResolution,
    ) -> Result<Vec<Payload>, BookingError> {
        let lang = resolution.language;
        let intent = self.intents.classify(text, lang).await;
        debug!("Intent for {}: {:?}", user_id, intent);

        let mut replies = match intent {
            Intent::Book => self.start_booking(user_id, state, lang).await,
            Intent::SelectLanguage(chosen) => return Ok(self.select_language(user_id, state, chosen).await),
            Intent::Greeting => {
                state.enter(Flow::LanguageSelect, Step::None);
                self.language_prompt(lang).await
            }
            Intent::ChangeLanguage => {
                state.enter(Flow::LanguageChange, Step::None);
                self.language_prompt(lang).await
            }
            Intent::TalkToClinic => {
                state.enter(Flow::TalkToClinic, Step::None);
                vec![self.with_menu_exit(MessageKey::TalkStarted, lang).await]
            }
            Intent::CancelAppointment => vec![
                self.say(MessageKey::CancelExisting, lang).await,
                self.main_menu(lang).await,
            ],
            Intent::Help => vec![self.say(MessageKey::Help, lang).await, self.main_menu(lang).await],
            Intent::MyId => vec![
                Payload::text(self.locale.render(MessageKey::YourId, lang, &[("id", user_id)]).await),
                self.main_menu(lang).await,
            ],
            Intent::ClinicInfo => {
                let hours = describe_hours(self.availability.generator().schedule());
                vec![
                    Payload::text(self.locale.render(MessageKey::ClinicInfo, lang, &[("hours", &hours)]).await),
                    self.main_menu(lang).await,
                ]
            }
            Intent::Menu => vec![self.main_menu(lang).await],
            Intent::Affirm | Intent::Deny | Intent::Unknown => vec![
                self.say(MessageKey::UnknownCommand, lang).await,
                self.main_menu(lang).await,
            ],
        };

        if let Some(proposed) = resolution.proposal {
            if state.is_idle() {
                replies.push(self.language_suggestion(proposed, lang).await);
            }
        }
        Ok(replies)
    }

    async fn forward_to_clinic(&self, user_id: &str, text: &str, lang: Language) -> Vec<Payload> {
        match &self.clinic_target {
            Some(target) => {
                let sender = match self.patients.find_patient_by_user(user_id).await {
                    Ok(Some(patient)) => patient.name,
                    _ => user_id.to_string(),
                };
                let message = self.locale
                    .render(
                        MessageKey::NotifyClinicMessage,
                        self.locale.default_language(),
                        &[("name", &sender), ("message", text.trim()), ("language", lang.native_name())],
                    )
                    .await;
                self.notifier.push(target, &[Payload::text(message)]).await;
                info!("Forwarded message from {} to the clinic", user_id);
            }
            None => warn!("No clinic target configured, message from {} not forwarded", user_id),
        }

        vec![self.with_menu_exit(MessageKey::TalkForwarded, lang).await]
    }

    // ==========================================================================
    // BOOKING FLOW
    // ==========================================================================

    async fn start_booking(&self, user_id: &str, state: &mut ConversationState, lang: Language) -> Vec<Payload> {
        state.reset_to_idle();
        state.enter(Flow::Booking, Step::None);
        state.draft = Some(BookingDraft::default());

        match self.patients.find_patient_by_user(user_id).await {
            Ok(Some(patient)) => {
                debug!("Known patient {} for {}, skipping contact details", patient.id, user_id);
                let draft = state.draft_mut();
                draft.patient_name = Some(patient.name);
                draft.phone = Some(patient.phone);
                self.ask_date(state, lang, false).await
            }
            Ok(None) => {
                state.current_step = Step::AwaitPatientName;
                vec![self.say(MessageKey::AskName, lang).await]
            }
            Err(e) => {
                warn!("Patient lookup for {} failed, asking for details: {}", user_id, e);
                state.current_step = Step::AwaitPatientName;
                vec![self.say(MessageKey::AskName, lang).await]
            }
        }
    }

    async fn handle_booking_step(
        &self,
        user_id: &str,
        text: &str,
        state: &mut ConversationState,
        lang: Language,
    ) -> Result<Vec<Payload>, BookingError> {
        match state.current_step {
            Step::AwaitPatientName => Ok(match validation::validate_name(text) {
                Ok(name) => {
                    state.draft_mut().patient_name = Some(name);
                    state.current_step = Step::AwaitPhone;
                    vec![self.say(MessageKey::AskPhone, lang).await]
                }
                Err(e) => {
                    debug!("Rejected name from {}: {}", user_id, e);
                    vec![self.say(MessageKey::AskNameRetry, lang).await]
                }
            }),
            Step::AwaitPhone => Ok(match validation::validate_phone(text) {
                Ok(phone) => {
                    state.draft_mut().phone = Some(phone);
                    self.register_patient(user_id, state, lang).await;
                    self.ask_date(state, lang, false).await
                }
                Err(e) => {
                    debug!("Rejected phone from {}: {}", user_id, e);
                    vec![self.say(MessageKey::AskPhoneRetry, lang).await]
                }
            }),
            Step::AwaitDate => Ok(self.answer_date(user_id, text, state, lang).await),
            Step::AwaitTime => Ok(self.answer_time(user_id, text, state, lang).await),
            Step::AwaitReason => Ok(match validation::validate_reason(text) {
                Ok(reason) => {
                    state.draft_mut().reason = Some(reason);
                    state.current_step = Step::AwaitConfirm;
                    vec![self.confirmation_prompt(state.draft_mut(), lang).await]
                }
                Err(e) => {
                    debug!("Rejected reason from {}: {}", user_id, e);
                    vec![self.say(MessageKey::AskReasonRetry, lang).await]
                }
            }),
            Step::AwaitConfirm => self.answer_confirmation(user_id, text, state, lang).await,
            Step::None => {
                warn!("Booking flow without a step for {}, restarting", user_id);
                Ok(self.start_booking(user_id, state, lang).await)
            }
        }
    }

    /// Offers the next open days starting tomorrow and waits for a date.
    async fn ask_date(&self, state: &mut ConversationState, lang: Language, retry: bool) -> Vec<Payload> {
        let today = self.clock.today_in(self.availability.clinic_tz());
        let dates = self.availability.upcoming_open_dates(today, self.booking_window_days);

        if dates.is_empty() {
            warn!("No open days in the next {} days", self.booking_window_days);
            state.reset_to_idle();
            return vec![self.say(MessageKey::NoDatesAvailable, lang).await, self.main_menu(lang).await];
        }

        state.current_step = Step::AwaitDate;
        state.offered_times.clear();
        state.offered_dates = dates;

        let key = if retry { MessageKey::AskDateRetry } else { MessageKey::AskDate };
        let options = state.offered_dates
            .iter()
            .map(|date| Choice::new(date.format("%Y-%m-%d (%a)").to_string(), format!("{}{}", DATE_PREFIX, date)))
            .collect();

        vec![Payload::choices(self.locale.text(key, lang).await, options)]
    }

    async fn answer_date(&self, user_id: &str, text: &str, state: &mut ConversationState, lang: Language) -> Vec<Payload> {
        let today = self.clock.today_in(self.availability.clinic_tz());
        let date = match validation::parse_date(text)
            .and_then(|date| validation::validate_date(date, today, self.availability.generator()))
        {
            Ok(date) => date,
            Err(e) => {
                debug!("Rejected date from {}: {}", user_id, e);
                return self.ask_date(state, lang, true).await;
            }
        };

        let free = self.availability.free_slots_on(date, self.clock.now()).await;
        if free.is_empty() {
            info!("No free times left on {} for {}", date, user_id);
            let mut replies = vec![Payload::text(
                self.locale.render(MessageKey::NoTimesOnDate, lang, &[("date", &date.to_string())]).await,
            )];
            replies.extend(self.ask_date(state, lang, false).await);
            return replies;
        }

        let draft = state.draft_mut();
        draft.date = Some(date);
        draft.time = None;
        state.offered_times = free.iter().map(|slot| slot.time).collect();
        state.current_step = Step::AwaitTime;

        vec![self.time_prompt(date, &state.offered_times, lang, false).await]
    }

    async fn time_prompt(&self, date: NaiveDate, times: &[NaiveTime], lang: Language, retry: bool) -> Payload {
        let prompt = if retry {
            self.locale.text(MessageKey::AskTimeRetry, lang).await
        } else {
            self.locale.render(MessageKey::AskTime, lang, &[("date", &date.to_string())]).await
        };
        let options = times
            .iter()
            .map(|time| {
                let hhmm = time.format("%H:%M").to_string();
                Choice::new(hhmm.clone(), format!("{}{}", TIME_PREFIX, hhmm))
            })
            .collect();

        Payload::choices(prompt, options)
    }

    async fn answer_time(&self, user_id: &str, text: &str, state: &mut ConversationState, lang: Language) -> Vec<Payload> {
        let Some(date) = state.draft.as_ref().and_then(|draft| draft.date) else {
            warn!("Time step without a date for {}, asking for the date again", user_id);
            return self.ask_date(state, lang, false).await;
        };

        let accepted = validation::parse_time(text).and_then(|time| {
            validation::validate_time(date, time, self.availability.generator(), &state.offered_times)
        });

        match accepted {
            Ok(time) => {
                state.draft_mut().time = Some(time);
                state.current_step = Step::AwaitReason;
                vec![self.say(MessageKey::AskReason, lang).await]
            }
            Err(e) => {
                debug!("Rejected time from {}: {}", user_id, e);
                vec![self.time_prompt(date, &state.offered_times, lang, true).await]
            }
        }
    }

    async fn confirmation_prompt(&self, draft: &BookingDraft, lang: Language) -> Payload {
        let date = draft.date.map(|d| d.to_string()).unwrap_or_default();
        let time = draft.time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default();

        let summary = self.locale
            .render(
                MessageKey::ConfirmSummary,
                lang,
                &[
                    ("name", draft.patient_name.as_deref().unwrap_or_default()),
                    ("date", &date),
                    ("time", &time),
                    ("reason", draft.reason.as_deref().unwrap_or_default()),
                ],
            )
            .await;

        Payload::choices(
            summary,
            vec![
                Choice::new(self.locale.text(MessageKey::ChoiceYes, lang).await, format!("{}yes", CONFIRM_PREFIX)),
                Choice::new(self.locale.text(MessageKey::ChoiceNo, lang).await, format!("{}no", CONFIRM_PREFIX)),
            ],
        )
    }

    async fn answer_confirmation(
        &self,
        user_id: &str,
        text: &str,
        state: &mut ConversationState,
        lang: Language,
    ) -> Result<Vec<Payload>, BookingError> {
        match self.intents.confirmation(text, lang).await {
            Some(true) => self.commit(user_id, state, lang).await,
            Some(false) => {
                info!("User {} declined the booking", user_id);
                state.reset_to_idle();
                Ok(vec![self.say(MessageKey::BookingCancelled, lang).await, self.main_menu(lang).await])
            }
            None => Ok(vec![
                self.say(MessageKey::ConfirmRetry, lang).await,
                self.confirmation_prompt(state.draft_mut(), lang).await,
            ]),
        }
    }

    /// Re-checks the slot live, then persists it in one call.
    async fn commit(&self, user_id: &str, state: &mut ConversationState, lang: Language) -> Result<Vec<Payload>, BookingError> {
        let draft = state.draft.clone().unwrap_or_default();

        let (Some(date), Some(time)) = (draft.date, draft.time) else {
            warn!("Confirmation without a slot for {}, asking for the date again", user_id);
            return Ok(self.ask_date(state, lang, false).await);
        };
        let Some(reason) = draft.reason.clone() else {
            state.current_step = Step::AwaitReason;
            return Ok(vec![self.say(MessageKey::AskReason, lang).await]);
        };

        match self.persist(user_id, &draft, date, time, reason, lang).await {
            Ok(appointment) => {
                state.reset_to_idle();
                self.notify_new_appointment(&appointment, lang).await;

                let hhmm = time.format("%H:%M").to_string();
                let booked = self.locale
                    .render(MessageKey::Booked, lang, &[("date", &date.to_string()), ("time", &hhmm)])
                    .await;
                Ok(vec![Payload::text(booked), self.main_menu(lang).await])
            }
            Err(BookingError::Conflict(slot)) => {
                info!("Slot {} no longer available for {}", slot, user_id);
                if let Some(draft) = state.draft.as_mut() {
                    draft.clear_slot();
                }
                let mut replies = vec![self.say(MessageKey::SlotTaken, lang).await];
                replies.extend(self.ask_date(state, lang, false).await);
                Ok(replies)
            }
            Err(BookingError::Persistence(msg)) => {
                error!("Could not persist appointment for {}: {}", user_id, msg);
                state.current_step = Step::AwaitConfirm;
                Ok(vec![
                    self.say(MessageKey::CommitFailed, lang).await,
                    self.confirmation_prompt(&draft, lang).await,
                ])
            }
            Err(other) => Err(other),
        }
    }

    async fn persist(
        &self,
        user_id: &str,
        draft: &BookingDraft,
        date: NaiveDate,
        time: NaiveTime,
        reason: String,
        lang: Language,
    ) -> Result<Appointment, BookingError> {
        let slot = Slot::new(date, time, self.availability.generator().duration());
        if !self.availability.is_slot_free(&slot).await {
            return Err(BookingError::Conflict(format!("{} {}", date, time.format("%H:%M"))));
        }

        let patient = self.ensure_patient(user_id, draft, lang).await?;
        let appointment = self.appointments
            .create_appointment(NewAppointment {
                patient_id: patient.id,
                patient_name: Some(patient.name),
                date,
                time,
                reason,
            })
            .await?;

        info!(
            "Appointment {} booked for {} on {} at {}",
            appointment.id, user_id, appointment.date, appointment.time.format("%H:%M")
        );
        Ok(appointment)
    }

    // ==========================================================================
    // PATIENTS AND NOTIFICATIONS
    // ==========================================================================

    async fn patient_preference(&self, user_id: &str) -> Option<Language> {
        match self.patients.find_patient_by_user(user_id).await {
            Ok(patient) => patient
                .and_then(|p| p.preferred_language)
                .and_then(|code| Language::from_code(&code)),
            Err(e) => {
                warn!("Could not read language preference for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Creates the patient record once contact details are known. A failure
    /// here is retried at commit.
    async fn register_patient(&self, user_id: &str, state: &ConversationState, lang: Language) {
        let Some(draft) = state.draft.as_ref() else {
            return;
        };
        let (Some(name), Some(phone)) = (draft.patient_name.clone(), draft.phone.clone()) else {
            return;
        };

        let new_patient = NewPatient {
            user_id: user_id.to_string(),
            name,
            phone,
            preferred_language: Some(lang.code().to_string()),
        };
        match self.patients.create_patient(new_patient).await {
            Ok(patient) => info!("Registered patient {} for {}", patient.id, user_id),
            Err(e) => warn!("Could not register patient for {}: {}", user_id, e),
        }
    }

    async fn ensure_patient(&self, user_id: &str, draft: &BookingDraft, lang: Language) -> Result<Patient, BookingError> {
        if let Some(patient) = self.patients.find_patient_by_user(user_id).await? {
            return Ok(patient);
        }

        let (Some(name), Some(phone)) = (draft.patient_name.clone(), draft.phone.clone()) else {
            return Err(BookingError::Validation("draft has no contact details".to_string()));
        };
        let patient = self.patients
            .create_patient(NewPatient {
                user_id: user_id.to_string(),
                name,
                phone,
                preferred_language: Some(lang.code().to_string()),
            })
            .await?;
        Ok(patient)
    }

    async fn notify_new_appointment(&self, appointment: &Appointment, lang: Language) {
        let Some(target) = &self.clinic_target else {
            debug!("No clinic target configured, skipping notification for {}", appointment.id);
            return;
        };

        let hhmm = appointment.time.format("%H:%M").to_string();
        let message = self.locale
            .render(
                MessageKey::NotifyNewAppointment,
                self.locale.default_language(),
                &[
                    ("name", appointment.patient_name.as_deref().unwrap_or_default()),
                    ("date", &appointment.date.to_string()),
                    ("time", &hhmm),
                    ("reason", &appointment.reason),
                    ("language", lang.native_name()),
                ],
            )
            .await;

        self.notifier.push(target, &[Payload::text(message)]).await;
    }

    // ==========================================================================
    // PROMPTS
    // ==========================================================================

    async fn say(&self, key: MessageKey, lang: Language) -> Payload {
        Payload::text(self.locale.text(key, lang).await)
    }

    async fn with_menu_exit(&self, key: MessageKey, lang: Language) -> Payload {
        Payload::choices(
            self.locale.text(key, lang).await,
            vec![Choice::new(self.locale.text(MessageKey::BackToMenu, lang).await, format!("{}menu", NAV_PREFIX))],
        )
    }

    async fn main_menu(&self, lang: Language) -> Payload {
        let entries = [
            (MessageKey::MenuBook, "book"),
            (MessageKey::MenuClinicInfo, "info"),
            (MessageKey::MenuTalk, "talk"),
            (MessageKey::MenuLanguage, "language"),
        ];

        let mut options = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            options.push(Choice::new(self.locale.text(key, lang).await, format!("{}{}", MENU_PREFIX, value)));
        }
        Payload::choices(self.locale.text(MessageKey::MainMenu, lang).await, options)
    }

    async fn language_prompt(&self, lang: Language) -> Vec<Payload> {
        let prompt = format!(
            "{}\n{}",
            self.locale.text(MessageKey::Welcome, lang).await,
            self.locale.text(MessageKey::ChooseLanguage, lang).await
        );
        let options = Language::ALL
            .iter()
            .map(|l| Choice::new(l.label(), format!("{}{}", LANGUAGE_PREFIX, l.code())))
            .collect();

        vec![Payload::choices(prompt, options)]
    }

    async fn language_suggestion(&self, proposed: Language, current: Language) -> Payload {
        let prompt = self.locale
            .render(MessageKey::SuggestLanguage, proposed, &[("language", proposed.native_name())])
            .await;

        Payload::choices(
            prompt,
            vec![
                Choice::new(proposed.label(), format!("{}{}", LANGUAGE_PREFIX, proposed.code())),
                Choice::new(self.locale.text(MessageKey::KeepLanguage, current).await, format!("{}main", MENU_PREFIX)),
            ],
        )
    }

    async fn failure_replies(&self, user_id: &str) -> Vec<Payload> {
        let lang = match self.conversations.get_state(user_id).await {
            Ok(Some(state)) => state.language.unwrap_or(self.locale.default_language()),
            _ => self.locale.default_language(),
        };

        vec![Payload::choices(
            self.locale.text(MessageKey::GenericError, lang).await,
            vec![
                Choice::new(self.locale.text(MessageKey::BackToLanguage, lang).await, format!("{}language", NAV_PREFIX)),
                Choice::new(self.locale.text(MessageKey::BackToMenu, lang).await, format!("{}menu", NAV_PREFIX)),
            ],
        )]
    }
}

/// Opening hours per weekday, e.g. `Mon 09:00-12:00, 13:00-18:00`.
pub fn describe_hours(schedule: &WeeklySchedule) -> String {
    const WEEK: [Weekday; 7] = [
        Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun,
    ];
    let hm = |t: NaiveTime| t.format("%H:%M").to_string();

    WEEK.iter()
        .filter_map(|day| {
            let hours = schedule.hours_for(*day)?;
            let spans = match hours.break_window() {
                Some((start, end)) => format!("{}-{}, {}-{}", hm(hours.open), hm(start), hm(end), hm(hours.close)),
                None => format!("{}-{}", hm(hours.open), hm(hours.close)),
            };
            Some(format!("{} {}", day, spans))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
