//! Keyword-based request categories.

/// Ticket category, in precedence order: when keywords of several categories
/// match, the first declared wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Deposit,
    Withdrawal,
    Login,
    Bug,
    Other,
}

const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Deposit,
        &["deposit", "депозит", "внести", "пополнить", "top up", "fund"],
    ),
    (
        Category::Withdrawal,
        &["withdraw", "вывод", "снять", "вывести", "cash out", "withdrawal"],
    ),
    (
        Category::Login,
        &["login", "логин", "войти", "авторизация", "не могу зайти", "пароль"],
    ),
    (
        Category::Bug,
        &["bug", "ошибка", "сломалось", "не работает", "crash", "падает"],
    ),
    (
        Category::Other,
        &["help", "помощь", "support", "поддержка", "вопрос"],
    ),
];

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Deposit => "Deposit",
            Category::Withdrawal => "Withdrawal",
            Category::Login => "Login",
            Category::Bug => "Bug",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify(text: &str) -> Category {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}
