use super::types::{PROFILE_FIELDS, ProfileInput, SimulationResult};

pub const PROFILE_QUESTIONS: [&str; 6] = [
    "What is your age?",
    "What is your occupation?",
    "What is your monthly income?",
    "What are your monthly expenses?",
    "What is your asset status (e.g., savings, real estate)?",
    "What is your risk preference (conservative, moderate, or aggressive)?",
];

pub const SUPPORT_SYSTEM_PROMPT: &str = "You are a professional customer service assistant responsible for answering questions about company services. Please note:
1. Maintain a professional and friendly tone
2. Keep answers concise and clear
3. Be honest about uncertain information
4. For specific prices or special services, suggest contacting human customer service
5. Use polite language
6. Structure answers with clear focus points
7. Ask for clarification if user questions are unclear

Company Information:
- Working Hours: 9 AM to 6 PM on weekdays
- Address: Central Business District
- Contact: Phone 400-888-8888, Email support@example.com
- Payment Methods: Bank Transfer, PayPal, and Credit Cards
";

pub fn build_profile_prompt(profile: &ProfileInput) -> String {
    let mut prompt = String::from(
        "As a professional financial advisor, please provide a comprehensive user profile analysis and personalized financial advice based on the following information.
Please analyze from these aspects:

1. Basic Financial Status Analysis
2. Income and Expense Structure Assessment
3. Risk Tolerance Assessment
4. Investment Recommendations
5. Financial Goal Planning
6. Risk Warnings

User Information:
",
    );
    for field in PROFILE_FIELDS {
        let value = profile.field(field).unwrap_or_default();
        prompt.push_str(&format!("{field}: {value}\n"));
    }
    prompt
}

/// Advice prompt; `profile` adds a context block when the session has analysed one.
pub fn build_advice_prompt(question: &str, profile: Option<&ProfileInput>) -> String {
    let profile_context = profile.map(profile_context_block).unwrap_or_default();

    format!(
        "You are a professional financial advisor. Please provide detailed and practical financial advice based on the user's question.

{profile_context}
User Question: {question}

Please provide:
1. Direct answer to the question
2. Relevant financial strategies
3. Risk considerations
4. Action recommendations
5. Additional resources or next steps

Keep the advice practical, actionable, and tailored to the user's profile if available."
    )
}

fn profile_context_block(profile: &ProfileInput) -> String {
    let or_na = |value: &str| {
        if value.is_empty() {
            "N/A".to_string()
        } else {
            value.to_string()
        }
    };
    format!(
        "
User Profile Context:
Age: {}
Occupation: {}
Monthly Income: {}
Monthly Expenses: {}
Assets: {}
Risk Preference: {}

",
        or_na(&profile.age),
        or_na(&profile.occupation),
        or_na(&profile.monthly_income),
        or_na(&profile.monthly_expenses),
        or_na(&profile.assets),
        or_na(&profile.risk_preference),
    )
}

pub fn build_simulation_prompt(result: &SimulationResult) -> String {
    format!(
        "As a financial advisor, analyze this investment simulation:

Initial Investment: {}
Expected Annual Return: {:.1}%
Investment Period: {} years
Final Amount: {}
Total Return: {}
ROI: {:.1}%

Please provide:
1. Analysis of this investment scenario
2. Risk assessment for this return rate
3. Recommendations for optimization
4. Diversification suggestions
5. Market considerations

Keep the analysis practical and actionable.",
        format_money(result.initial_amount),
        result.annual_rate,
        result.years,
        format_money(result.final_amount),
        format_money(result.total_return),
        result.roi_percentage,
    )
}

pub fn build_chat_prompt(message: &str) -> String {
    format!("{SUPPORT_SYSTEM_PROMPT}\n\nUser Question: {message}")
}

/// Formats a dollar amount with thousands separators and cents, e.g. `$1,234.50`.
pub fn format_money(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}
