use voxtrigger_core::KeywordEvent;

pub type KeywordObserver = Box<dyn FnMut(&KeywordEvent)>;
pub type FinalTextObserver = Box<dyn FnMut(&str)>;

/// Registered observers, invoked synchronously on the control thread in
/// registration order.
#[derive(Default)]
pub struct EventBus {
    keyword: Vec<KeywordObserver>,
    final_text: Vec<FinalTextObserver>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_keyword(&mut self, observer: impl FnMut(&KeywordEvent) + 'static) {
        self.keyword.push(Box::new(observer));
    }

    pub fn on_final_text(&mut self, observer: impl FnMut(&str) + 'static) {
        self.final_text.push(Box::new(observer));
    }

    pub fn emit_keyword(&mut self, event: &KeywordEvent) {
        for observer in &mut self.keyword {
            observer(event);
        }
    }

    pub fn emit_final_text(&mut self, text: &str) {
        for observer in &mut self.final_text {
            observer(text);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.keyword.len() + self.final_text.len()
    }
}
