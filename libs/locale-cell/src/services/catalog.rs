use async_trait::async_trait;
use tracing::debug;

use crate::models::{Language, LocaleError, MessageKey};
use crate::services::translator::OpenAiTranslator;

/// Source of localized strings, translations and language guesses.
///
/// Implementations may be remote; callers must degrade when they fail.
#[async_trait]
pub trait LanguageCatalog: Send + Sync {
    /// `Ok(None)` when the catalog has no entry for this pair.
    async fn resolve(&self, key: MessageKey, language: Language) -> Result<Option<String>, LocaleError>;

    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, LocaleError>;

    async fn detect(&self, text: &str) -> Result<Option<Language>, LocaleError>;
}

/// Built-in tables, optionally backed by a translation service for
/// translation and for detection the script heuristic cannot settle.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    translator: Option<OpenAiTranslator>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self { translator: None }
    }

    pub fn with_translator(translator: Option<OpenAiTranslator>) -> Self {
        Self { translator }
    }

    pub fn has_translator(&self) -> bool {
        self.translator.is_some()
    }

    /// Synchronous table lookup.
    pub fn lookup(key: MessageKey, language: Language) -> Option<&'static str> {
        match language {
            Language::En => english(key),
            Language::Ja => japanese(key),
            Language::Pt => portuguese(key),
            Language::Zh => chinese(key),
            Language::Ko => korean(key),
            Language::Es => spanish(key),
            Language::Tl => tagalog(key),
            Language::Vi => vietnamese(key),
        }
    }
}

#[async_trait]
impl LanguageCatalog for StaticCatalog {
    async fn resolve(&self, key: MessageKey, language: Language) -> Result<Option<String>, LocaleError> {
        Ok(Self::lookup(key, language).map(str::to_string))
    }

    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, LocaleError> {
        if from == to {
            return Ok(text.to_string());
        }
        match &self.translator {
            Some(translator) => translator.translate(text, from, to).await,
            None => Err(LocaleError::ServiceUnavailable("no translation service configured".to_string())),
        }
    }

    async fn detect(&self, text: &str) -> Result<Option<Language>, LocaleError> {
        if let Some(language) = detect_script(text) {
            return Ok(Some(language));
        }
        match &self.translator {
            Some(translator) if text.chars().filter(|c| c.is_alphabetic()).count() >= 4 => {
                translator.detect(text).await
            }
            _ => Ok(None),
        }
    }
}

/// Guesses a language from characters that only one supported language uses.
///
/// Han ideographs without kana are ambiguous between Japanese and Chinese and
/// plain ASCII says nothing, so both return `None`.
pub fn detect_script(text: &str) -> Option<Language> {
    let mut kana = false;
    let mut hangul = false;
    let mut han = false;

    for c in text.chars() {
        match c {
            '\u{3040}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => kana = true,
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => hangul = true,
            '\u{4E00}'..='\u{9FFF}' => han = true,
            _ => {}
        }
    }

    if kana {
        return Some(Language::Ja);
    }
    if hangul {
        return Some(Language::Ko);
    }
    if han {
        debug!("Han-only text is ambiguous between ja and zh");
        return None;
    }

    let lower = text.to_lowercase();
    if lower.chars().any(|c| "ăơưđạảấầẩẫậắằẳẵặẹẻẽếềểễệỉịọỏốồổỗộớờởỡợụủứừửữựỳỵỷỹ".contains(c)) {
        return Some(Language::Vi);
    }
    if lower.chars().any(|c| "ãõç".contains(c)) {
        return Some(Language::Pt);
    }
    if lower.chars().any(|c| "ñ¿¡".contains(c)) {
        return Some(Language::Es);
    }
    None
}

// ==============================================================================
// TABLES
// ==============================================================================

fn english(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    let text = match key {
        Welcome => "Welcome to Clinica Tanaka! 🏥",
        ChooseLanguage => "Please choose your language.",
        LanguageSet => "Language set to {language}.",
        SuggestLanguage => "It looks like you are writing in {language}. Would you like to switch?",
        KeepLanguage => "Keep current language",
        MainMenu => "How can we help you today?",
        MenuBook => "Book an appointment",
        MenuClinicInfo => "Clinic information",
        MenuTalk => "Talk to the clinic",
        MenuLanguage => "Change language",
        ClinicInfo => "Clinica Tanaka\nOpening hours: {hours}\nFor anything urgent, please call the clinic directly.",
        Help => "Here's how you can use this assistant:\n\n• To book an appointment, type 'book' or tap the button\n• To change language, type 'language'\n• To talk to the clinic, type 'talk'\n• To see your user ID, type 'myid'\n• Type 'menu' or 'cancel' at any time to stop what you are doing",
        YourId => "Your user ID is:\n{id}\n\nThis ID identifies you in our system.",
        CancelExisting => "To cancel an existing appointment, please contact the clinic directly.",
        UnknownCommand => "Sorry, I didn't understand that.",
        AskName => "Please tell us your full name.",
        AskNameRetry => "We need your name to book an appointment. Please type your full name.",
        AskPhone => "Please tell us a phone number where we can reach you.",
        AskPhoneRetry => "That doesn't look like a phone number. Please enter at least 7 digits.",
        AskDate => "Please choose a date for your appointment.",
        AskDateRetry => "Please choose one of the dates offered, or type a date as YYYY-MM-DD.",
        NoDatesAvailable => "Sorry, there are no open days in the coming period. Please contact the clinic.",
        AskTime => "Please choose a time on {date}.",
        AskTimeRetry => "That time is not available. Please choose one of the times offered.",
        NoTimesOnDate => "Sorry, there are no free times left on {date}. Please choose another date.",
        AskReason => "Please briefly describe the reason for your visit.",
        AskReasonRetry => "Please tell us the reason for your visit.",
        ConfirmSummary => "Please confirm your appointment:\n\nName: {name}\nDate: {date}\nTime: {time}\nReason: {reason}",
        ConfirmRetry => "Please answer yes to confirm or no to cancel.",
        ChoiceYes => "Yes",
        ChoiceNo => "No",
        Booked => "Your appointment on {date} at {time} has been requested. The clinic will confirm it soon.",
        BookingCancelled => "Booking cancelled. Nothing was saved.",
        SlotTaken => "Sorry, that time was just taken. Please choose another date.",
        CommitFailed => "We could not save your appointment right now. Please try confirming again in a moment.",
        BackToMenu => "Main menu",
        TalkStarted => "Please type your message to the clinic. A staff member will respond as soon as possible.\n\nTo return to the main menu, type 'menu'.",
        TalkForwarded => "Your message has been sent to the clinic.",
        GenericError => "Sorry, something went wrong.",
        BackToLanguage => "Choose language",
        NotifyNewAppointment => "🔔 New appointment\n\nPatient: {name}\nDate: {date}\nTime: {time}\nReason: {reason}\nLanguage: {language}",
        NotifyClinicMessage => "📩 Message from {name}\n\n{message}\n\n(Language: {language})",
        KeywordsBook => "book|booking|appointment|reserve|reservation|schedule",
        KeywordsCancel => "cancel|stop|quit",
        KeywordsHelp => "help|commands",
        KeywordsLanguage => "language|lang",
        KeywordsMyId => "myid|my id",
        KeywordsTalk => "talk|staff|contact",
        KeywordsInfo => "info|information|hours|address",
        KeywordsGreeting => "hi|hello|hey|start",
        KeywordsMenu => "menu|back|home",
        KeywordsYes => "yes|y|ok|okay|confirm",
        KeywordsNo => "no|n|nope",
    };
    Some(text)
}

fn japanese(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    let text = match key {
        Welcome => "田中クリニックへようこそ！🏥",
        ChooseLanguage => "言語を選択してください。",
        LanguageSet => "言語を{language}に設定しました。",
        SuggestLanguage => "{language}で入力されているようです。言語を切り替えますか？",
        KeepLanguage => "このままにする",
        MainMenu => "ご用件をお選びください。",
        MenuBook => "予約する",
        MenuClinicInfo => "クリニック情報",
        MenuTalk => "クリニックと話す",
        MenuLanguage => "言語を変更",
        ClinicInfo => "田中クリニック\n診療時間: {hours}\nお急ぎの場合は直接お電話ください。",
        Help => "使い方:\n\n• 予約するには「予約」と入力するかボタンを押してください\n• 言語を変更するには「言語」と入力してください\n• クリニックと話すには「相談」と入力してください\n• ユーザーIDを確認するには「myid」と入力してください\n• いつでも「メニュー」または「キャンセル」で中断できます",
        YourId => "あなたのユーザーIDは:\n{id}\n\nこのIDでシステム上のあなたを識別します。",
        CancelExisting => "予約をキャンセルするには、クリニックに直接ご連絡ください。",
        UnknownCommand => "申し訳ありません、理解できませんでした。",
        AskName => "お名前（フルネーム）を入力してください。",
        AskNameRetry => "予約にはお名前が必要です。フルネームを入力してください。",
        AskPhone => "ご連絡先の電話番号を入力してください。",
        AskPhoneRetry => "電話番号が正しくないようです。7桁以上の数字を入力してください。",
        AskDate => "ご希望の日付を選択してください。",
        AskDateRetry => "表示された日付から選ぶか、YYYY-MM-DD の形式で入力してください。",
        NoDatesAvailable => "申し訳ありません、近日中に予約可能な日がありません。クリニックにご連絡ください。",
        AskTime => "{date}のご希望の時間を選択してください。",
        AskTimeRetry => "その時間は予約できません。表示された時間から選択してください。",
        NoTimesOnDate => "申し訳ありません、{date}は空きがありません。別の日付を選択してください。",
        AskReason => "受診理由を簡単に入力してください。",
        AskReasonRetry => "受診理由を入力してください。",
        ConfirmSummary => "ご予約内容をご確認ください:\n\nお名前: {name}\n日付: {date}\n時間: {time}\n理由: {reason}",
        ConfirmRetry => "確定する場合は「はい」、取り消す場合は「いいえ」と入力してください。",
        ChoiceYes => "はい",
        ChoiceNo => "いいえ",
        Booked => "{date} {time}のご予約を受け付けました。クリニックから確認のご連絡をいたします。",
        BookingCancelled => "予約を取り消しました。保存された内容はありません。",
        SlotTaken => "申し訳ありません、その時間はたった今埋まりました。別の日付を選択してください。",
        CommitFailed => "現在ご予約を保存できませんでした。しばらくしてからもう一度確定してください。",
        BackToMenu => "メインメニュー",
        TalkStarted => "クリニックへのメッセージを入力してください。スタッフができるだけ早く返信いたします。\n\nメインメニューに戻るには「メニュー」と入力してください。",
        TalkForwarded => "メッセージをクリニックに送信しました。",
        GenericError => "申し訳ありません、エラーが発生しました。",
        BackToLanguage => "言語を選択",
        NotifyNewAppointment => "🔔 新しい予約\n\n患者: {name}\n日付: {date}\n時間: {time}\n理由: {reason}\n言語: {language}",
        NotifyClinicMessage => "📩 {name} からのメッセージ\n\n{message}\n\n(言語: {language})",
        KeywordsBook => "予約|よやく|予約したい",
        KeywordsCancel => "キャンセル|取り消し|やめる",
        KeywordsHelp => "ヘルプ|使い方|助けて",
        KeywordsLanguage => "言語|げんご",
        KeywordsMyId => "マイid|自分のid",
        KeywordsTalk => "相談|話す|スタッフ",
        KeywordsInfo => "情報|診療時間|アクセス|住所",
        KeywordsGreeting => "こんにちは|こんばんは|おはよう|はじめまして",
        KeywordsMenu => "メニュー|戻る",
        KeywordsYes => "はい|確定|お願いします",
        KeywordsNo => "いいえ|いや|やめる",
    };
    Some(text)
}

fn portuguese(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    let text = match key {
        Welcome => "Bem-vindo à Clinica Tanaka! 🏥",
        ChooseLanguage => "Por favor, escolha seu idioma.",
        LanguageSet => "Idioma definido para {language}.",
        SuggestLanguage => "Parece que você está escrevendo em {language}. Deseja mudar o idioma?",
        KeepLanguage => "Manter idioma atual",
        MainMenu => "Como podemos ajudar hoje?",
        MenuBook => "Agendar consulta",
        MenuClinicInfo => "Informações da clínica",
        MenuTalk => "Falar com a clínica",
        MenuLanguage => "Mudar idioma",
        ClinicInfo => "Clinica Tanaka\nHorário de atendimento: {hours}\nEm caso de urgência, ligue diretamente para a clínica.",
        Help => "Veja como usar este assistente:\n\n• Para agendar uma consulta, digite 'agendar' ou toque no botão\n• Para mudar o idioma, digite 'idioma'\n• Para falar com a clínica, digite 'falar'\n• Para ver seu ID de usuário, digite 'meuid'\n• Digite 'menu' ou 'cancelar' a qualquer momento para parar",
        YourId => "Seu ID de usuário é:\n{id}\n\nEste ID identifica você em nosso sistema.",
        CancelExisting => "Para cancelar uma consulta, entre em contato diretamente com a clínica.",
        UnknownCommand => "Desculpe, não entendi.",
        AskName => "Por favor, informe seu nome completo.",
        AskNameRetry => "Precisamos do seu nome para agendar. Por favor, digite seu nome completo.",
        AskPhone => "Por favor, informe um telefone para contato.",
        AskPhoneRetry => "Isso não parece um número de telefone. Digite pelo menos 7 dígitos.",
        AskDate => "Por favor, escolha uma data para a consulta.",
        AskDateRetry => "Escolha uma das datas oferecidas ou digite uma data no formato AAAA-MM-DD.",
        NoDatesAvailable => "Desculpe, não há dias disponíveis no período. Por favor, entre em contato com a clínica.",
        AskTime => "Por favor, escolha um horário em {date}.",
        AskTimeRetry => "Esse horário não está disponível. Escolha um dos horários oferecidos.",
        NoTimesOnDate => "Desculpe, não há mais horários livres em {date}. Escolha outra data.",
        AskReason => "Descreva brevemente o motivo da consulta.",
        AskReasonRetry => "Por favor, informe o motivo da consulta.",
        ConfirmSummary => "Por favor, confirme sua consulta:\n\nNome: {name}\nData: {date}\nHorário: {time}\nMotivo: {reason}",
        ConfirmRetry => "Responda sim para confirmar ou não para cancelar.",
        ChoiceYes => "Sim",
        ChoiceNo => "Não",
        Booked => "Sua consulta em {date} às {time} foi solicitada. A clínica confirmará em breve.",
        BookingCancelled => "Agendamento cancelado. Nada foi salvo.",
        SlotTaken => "Desculpe, esse horário acabou de ser ocupado. Escolha outra data.",
        CommitFailed => "Não foi possível salvar sua consulta agora. Tente confirmar novamente em instantes.",
        BackToMenu => "Menu principal",
        TalkStarted => "Digite sua mensagem para a clínica. Um atendente responderá o mais rápido possível.\n\nPara voltar ao menu principal, digite 'menu'.",
        TalkForwarded => "Sua mensagem foi enviada para a clínica.",
        GenericError => "Desculpe, ocorreu um erro.",
        BackToLanguage => "Escolher idioma",
        NotifyNewAppointment => "🔔 Nova consulta\n\nPaciente: {name}\nData: {date}\nHorário: {time}\nMotivo: {reason}\nIdioma: {language}",
        NotifyClinicMessage => "📩 Mensagem de {name}\n\n{message}\n\n(Idioma: {language})",
        KeywordsBook => "agendar|agendamento|consulta|marcar",
        KeywordsCancel => "cancelar|parar|sair",
        KeywordsHelp => "ajuda|comandos",
        KeywordsLanguage => "idioma|língua|lingua",
        KeywordsMyId => "meuid|meu id",
        KeywordsTalk => "falar|atendente|contato",
        KeywordsInfo => "informações|informacoes|horário|horario|endereço|endereco",
        KeywordsGreeting => "oi|olá|ola|bom dia|boa tarde|boa noite",
        KeywordsMenu => "menu|voltar|início|inicio",
        KeywordsYes => "sim|s|confirmar",
        KeywordsNo => "não|nao",
    };
    Some(text)
}

fn chinese(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    match key {
        Welcome => Some("欢迎来到田中诊所！🏥"),
        ChooseLanguage => Some("请选择您的语言。"),
        MainMenu => Some("请问需要什么帮助？"),
        MenuBook => Some("预约"),
        AskDate => Some("请选择预约日期。"),
        AskTime => Some("请选择{date}的时间。"),
        AskReason => Some("请简要说明就诊原因。"),
        ConfirmSummary => Some("请确认您的预约：\n\n姓名：{name}\n日期：{date}\n时间：{time}\n原因：{reason}"),
        ChoiceYes => Some("是"),
        ChoiceNo => Some("否"),
        Booked => Some("已收到您{date} {time}的预约申请。诊所将很快与您确认。"),
        BookingCancelled => Some("预约已取消。"),
        KeywordsBook => Some("预约|挂号"),
        KeywordsCancel => Some("取消"),
        KeywordsHelp => Some("帮助"),
        KeywordsGreeting => Some("你好|您好"),
        KeywordsMenu => Some("菜单|返回"),
        KeywordsYes => Some("是|确认|好的"),
        KeywordsNo => Some("否|不"),
        _ => None,
    }
}

fn korean(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    match key {
        Welcome => Some("다나카 클리닉에 오신 것을 환영합니다! 🏥"),
        ChooseLanguage => Some("언어를 선택해 주세요."),
        MainMenu => Some("무엇을 도와드릴까요?"),
        MenuBook => Some("예약하기"),
        AskDate => Some("예약 날짜를 선택해 주세요."),
        AskTime => Some("{date}의 시간을 선택해 주세요."),
        AskReason => Some("방문 사유를 간단히 적어 주세요."),
        ConfirmSummary => Some("예약 내용을 확인해 주세요:\n\n이름: {name}\n날짜: {date}\n시간: {time}\n사유: {reason}"),
        ChoiceYes => Some("예"),
        ChoiceNo => Some("아니요"),
        Booked => Some("{date} {time} 예약이 접수되었습니다. 곧 클리닉에서 확인해 드립니다."),
        BookingCancelled => Some("예약이 취소되었습니다."),
        KeywordsBook => Some("예약"),
        KeywordsCancel => Some("취소"),
        KeywordsHelp => Some("도움말"),
        KeywordsGreeting => Some("안녕하세요|안녕"),
        KeywordsMenu => Some("메뉴|돌아가기"),
        KeywordsYes => Some("예|네|확인"),
        KeywordsNo => Some("아니요|아니오"),
        _ => None,
    }
}

fn spanish(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    match key {
        Welcome => Some("¡Bienvenido a Clinica Tanaka! 🏥"),
        ChooseLanguage => Some("Por favor, elija su idioma."),
        MainMenu => Some("¿En qué podemos ayudarle hoy?"),
        MenuBook => Some("Reservar cita"),
        AskDate => Some("Por favor, elija una fecha para su cita."),
        AskTime => Some("Por favor, elija una hora el {date}."),
        AskReason => Some("Describa brevemente el motivo de su visita."),
        ConfirmSummary => Some("Por favor, confirme su cita:\n\nNombre: {name}\nFecha: {date}\nHora: {time}\nMotivo: {reason}"),
        ChoiceYes => Some("Sí"),
        ChoiceNo => Some("No"),
        Booked => Some("Su cita el {date} a las {time} ha sido solicitada. La clínica la confirmará pronto."),
        BookingCancelled => Some("Reserva cancelada."),
        KeywordsBook => Some("cita|reservar|agendar"),
        KeywordsCancel => Some("cancelar"),
        KeywordsHelp => Some("ayuda"),
        KeywordsGreeting => Some("hola|buenos días|buenas tardes"),
        KeywordsMenu => Some("menú|menu|volver"),
        KeywordsYes => Some("sí|si|confirmar"),
        KeywordsNo => Some("no"),
        _ => None,
    }
}

fn tagalog(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    match key {
        Welcome => Some("Maligayang pagdating sa Clinica Tanaka! 🏥"),
        ChooseLanguage => Some("Pakipili ang iyong wika."),
        MainMenu => Some("Paano ka namin matutulungan ngayon?"),
        MenuBook => Some("Mag-book ng appointment"),
        AskDate => Some("Pakipili ang petsa ng iyong appointment."),
        AskTime => Some("Pakipili ang oras sa {date}."),
        AskReason => Some("Pakilarawan nang maikli ang dahilan ng iyong pagbisita."),
        ConfirmSummary => Some("Pakikumpirma ang iyong appointment:\n\nPangalan: {name}\nPetsa: {date}\nOras: {time}\nDahilan: {reason}"),
        ChoiceYes => Some("Oo"),
        ChoiceNo => Some("Hindi"),
        Booked => Some("Natanggap ang iyong appointment sa {date} nang {time}. Kukumpirmahin ito ng klinika sa lalong madaling panahon."),
        BookingCancelled => Some("Kinansela ang booking."),
        KeywordsBook => Some("appointment|magpa-book|mag-book"),
        KeywordsCancel => Some("kanselahin|cancel"),
        KeywordsHelp => Some("tulong"),
        KeywordsGreeting => Some("kumusta|magandang araw"),
        KeywordsMenu => Some("menu|bumalik"),
        KeywordsYes => Some("oo|opo"),
        KeywordsNo => Some("hindi"),
        _ => None,
    }
}

fn vietnamese(key: MessageKey) -> Option<&'static str> {
    use MessageKey::*;
    match key {
        Welcome => Some("Chào mừng bạn đến với Phòng khám Tanaka! 🏥"),
        ChooseLanguage => Some("Vui lòng chọn ngôn ngữ của bạn."),
        MainMenu => Some("Chúng tôi có thể giúp gì cho bạn hôm nay?"),
        MenuBook => Some("Đặt lịch hẹn"),
        AskDate => Some("Vui lòng chọn ngày hẹn."),
        AskTime => Some("Vui lòng chọn giờ vào ngày {date}."),
        AskReason => Some("Vui lòng mô tả ngắn gọn lý do khám."),
        ConfirmSummary => Some("Vui lòng xác nhận lịch hẹn:\n\nTên: {name}\nNgày: {date}\nGiờ: {time}\nLý do: {reason}"),
        ChoiceYes => Some("Có"),
        ChoiceNo => Some("Không"),
        Booked => Some("Lịch hẹn ngày {date} lúc {time} đã được ghi nhận. Phòng khám sẽ sớm xác nhận."),
        BookingCancelled => Some("Đã hủy đặt lịch."),
        KeywordsBook => Some("đặt lịch|hẹn"),
        KeywordsCancel => Some("hủy"),
        KeywordsHelp => Some("trợ giúp"),
        KeywordsGreeting => Some("xin chào|chào"),
        KeywordsMenu => Some("menu|quay lại"),
        KeywordsYes => Some("có|đồng ý"),
        KeywordsNo => Some("không"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: [Language; 3] = [Language::En, Language::Ja, Language::Pt];

    const EVERY_KEY: [MessageKey; 53] = [
        MessageKey::Welcome, MessageKey::ChooseLanguage, MessageKey::LanguageSet, MessageKey::SuggestLanguage,
        MessageKey::KeepLanguage, MessageKey::MainMenu, MessageKey::MenuBook, MessageKey::MenuClinicInfo,
        MessageKey::MenuTalk, MessageKey::MenuLanguage, MessageKey::ClinicInfo, MessageKey::Help,
        MessageKey::YourId, MessageKey::CancelExisting, MessageKey::UnknownCommand, MessageKey::AskName,
        MessageKey::AskNameRetry, MessageKey::AskPhone, MessageKey::AskPhoneRetry, MessageKey::AskDate,
        MessageKey::AskDateRetry, MessageKey::NoDatesAvailable, MessageKey::AskTime, MessageKey::AskTimeRetry,
        MessageKey::NoTimesOnDate, MessageKey::AskReason, MessageKey::AskReasonRetry, MessageKey::ConfirmSummary,
        MessageKey::ConfirmRetry, MessageKey::ChoiceYes, MessageKey::ChoiceNo, MessageKey::Booked,
        MessageKey::BookingCancelled, MessageKey::SlotTaken, MessageKey::CommitFailed, MessageKey::BackToMenu,
        MessageKey::TalkStarted, MessageKey::TalkForwarded, MessageKey::GenericError, MessageKey::BackToLanguage,
        MessageKey::NotifyNewAppointment, MessageKey::NotifyClinicMessage, MessageKey::KeywordsBook,
        MessageKey::KeywordsCancel, MessageKey::KeywordsHelp, MessageKey::KeywordsLanguage, MessageKey::KeywordsMyId,
        MessageKey::KeywordsTalk, MessageKey::KeywordsInfo, MessageKey::KeywordsGreeting, MessageKey::KeywordsMenu,
        MessageKey::KeywordsYes, MessageKey::KeywordsNo,
    ];

    #[test]
    fn full_tables_cover_every_key() {
        for language in FULL {
            for key in EVERY_KEY {
                assert!(StaticCatalog::lookup(key, language).is_some(), "{} missing {}", language, key);
            }
        }
    }

    #[test]
    fn partial_tables_cover_the_booking_prompts() {
        for language in [Language::Zh, Language::Ko, Language::Es, Language::Tl, Language::Vi] {
            for key in [MessageKey::Welcome, MessageKey::AskDate, MessageKey::AskTime, MessageKey::ConfirmSummary, MessageKey::KeywordsYes] {
                assert!(StaticCatalog::lookup(key, language).is_some(), "{} missing {}", language, key);
            }
            assert!(StaticCatalog::lookup(MessageKey::CommitFailed, language).is_none());
        }
    }

    #[test]
    fn script_heuristic() {
        assert_eq!(detect_script("予約したいです"), Some(Language::Ja));
        assert_eq!(detect_script("예약하고 싶어요"), Some(Language::Ko));
        assert_eq!(detect_script("Tôi muốn đặt lịch"), Some(Language::Vi));
        assert_eq!(detect_script("Não sei"), Some(Language::Pt));
        assert_eq!(detect_script("¿Mañana?"), Some(Language::Es));
        assert_eq!(detect_script("预约"), None);
        assert_eq!(detect_script("book"), None);
    }

    #[tokio::test]
    async fn translation_without_service_is_unavailable() {
        let catalog = StaticCatalog::new();

        assert_eq!(catalog.translate("Hello", Language::En, Language::En).await.unwrap(), "Hello");
        assert!(catalog.translate("Hello", Language::En, Language::Zh).await.is_err());
        assert_eq!(catalog.detect("hello there").await.unwrap(), None);
    }
}
