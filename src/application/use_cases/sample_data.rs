//! Canned support-agent test cases used to populate an empty worksheet.

use crate::domain::test_case::{
    AiResponse, Feedback, NewTestCase, RunStatus, TestCaseRow, TestMetrics,
};
use crate::shared::now_millis;

struct SampleCase {
    question: &'static str,
    expected_answer: &'static str,
    leading_questions: &'static str,
    notes: &'static str,
    /// Response, accuracy, latency and feedback for rows that have been run.
    result: Option<(&'static str, u8, f64, Option<Feedback>)>,
}

const SAMPLE_CASES: &[SampleCase] = &[
    SampleCase {
        question: "What are your pricing plans?",
        expected_answer: "We offer three plans: Starter at $29/month, Pro at $79/month with priority support, and Enterprise with custom pricing. Every plan includes a 14-day free trial.",
        leading_questions: "How much does it cost?\nWhat plans do you have?\nPricing details?",
        notes: "Core pricing question - high traffic",
        result: Some((
            "We have three pricing tiers:\n\n1. **Starter** - $29/month\n2. **Pro** - $79/month\n3. **Enterprise** - Custom pricing\n\nAll plans include a 14-day free trial.",
            94,
            1.2,
            Some(Feedback::Up),
        )),
    },
    SampleCase {
        question: "How do I reset my password?",
        expected_answer: "Click \"Forgot Password\" on the login page and enter your registered email. You will receive a link to create a new password.",
        leading_questions: "I forgot my password\nCan't log in\nLost password help",
        notes: "Common support question",
        result: Some((
            "To reset your password:\n1. Go to the login page\n2. Click \"Forgot Password\"\n3. Enter your email address\n4. Check your inbox for reset instructions",
            88,
            0.9,
            Some(Feedback::Up),
        )),
    },
    SampleCase {
        question: "Do you offer refunds?",
        expected_answer: "Yes. There is a 30-day money-back guarantee. Refunds are processed within 5-7 business days to the original payment method.",
        leading_questions: "Can I get my money back?\nRefund policy\nMoney back guarantee",
        notes: "Refund handling test",
        result: Some((
            "Yes! We offer a **30-day money-back guarantee**. Refunds take 5-7 business days.",
            96,
            0.6,
            Some(Feedback::Up),
        )),
    },
    SampleCase {
        question: "How do I integrate with Slack?",
        expected_answer: "Go to Settings > Integrations > Slack and click Connect. Follow the OAuth flow to authorize, then map notifications to specific channels.",
        leading_questions: "Slack integration\nConnect to Slack\nSlack setup",
        notes: "Missing OAuth details - needs improvement",
        result: Some((
            "To integrate with Slack:\n1. Go to Settings\n2. Click Integrations\n3. Find Slack and click Connect",
            78,
            1.5,
            None,
        )),
    },
    SampleCase {
        question: "Can I export my data?",
        expected_answer: "Yes, go to Settings > Data > Export. You can download reports and history as CSV or PDF.",
        leading_questions: "Export data\nDownload my data\nData portability",
        notes: "GDPR compliance question",
        result: Some((
            "You can export your data anytime from Settings > Data > Export. Choose CSV or PDF.",
            91,
            1.1,
            Some(Feedback::Up),
        )),
    },
    SampleCase {
        question: "How do I cancel my subscription?",
        expected_answer: "Go to Settings > Billing > Cancel Subscription. You keep access until the current billing period ends.",
        leading_questions: "Cancel account\nStop subscription\nUnsubscribe",
        notes: "Response too long - optimization needed",
        result: Some((
            "To cancel:\n1. Go to Settings > Billing\n2. Click \"Cancel Subscription\"\n3. Confirm cancellation\n\nYour access continues until the current billing period ends.",
            72,
            2.1,
            None,
        )),
    },
    SampleCase {
        question: "Is my data secure?",
        expected_answer: "Yes. Data is encrypted with AES-256, we are SOC 2 Type II certified and GDPR compliant, with regular security audits.",
        leading_questions: "Security\nData privacy\nEncryption",
        notes: "Security-conscious customer",
        result: Some((
            "Your data is protected by:\n- AES-256 encryption\n- SOC 2 Type II certification\n- GDPR compliance\n- Regular security audits",
            97,
            0.5,
            Some(Feedback::Up),
        )),
    },
    SampleCase {
        question: "Do you have a mobile app?",
        expected_answer: "Yes, on the iOS App Store and Google Play Store, with the same features as the web app.",
        leading_questions: "Mobile app\niPhone app\nAndroid app",
        notes: "Mobile platform query",
        result: None,
    },
    SampleCase {
        question: "What payment methods do you accept?",
        expected_answer: "We accept credit and debit cards, bank transfers and major digital wallets.",
        leading_questions: "Payment options\nHow to pay\nCredit card",
        notes: "Payment inquiry",
        result: None,
    },
    SampleCase {
        question: "What is your uptime guarantee?",
        expected_answer: "We guarantee a 99.9% uptime SLA. If uptime falls below 99.5% in a month you receive service credits automatically.",
        leading_questions: "Uptime\nReliability\nSLA",
        notes: "Enterprise sales question",
        result: None,
    },
];

pub fn sample_test_cases() -> Vec<TestCaseRow> {
    SAMPLE_CASES
        .iter()
        .map(|sample| {
            let mut row = TestCaseRow::new(NewTestCase {
                question: sample.question.to_string(),
                expected_answer: sample.expected_answer.to_string(),
                leading_questions: sample.leading_questions.to_string(),
                notes: sample.notes.to_string(),
                ..Default::default()
            });
            if let Some((content, accuracy, latency, feedback)) = sample.result {
                row.ai_response = Some(AiResponse {
                    content: content.to_string(),
                    feedback,
                    generated_at: Some(now_millis()),
                });
                row.metrics = Some(TestMetrics::new(accuracy, latency));
                row.run_status = RunStatus::Complete;
            }
            row
        })
        .collect()
}
