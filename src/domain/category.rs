use serde::{Deserialize, Serialize};

/// Budgeting bucket a category counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Income,
    Needs,
    Wants,
    Savings,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Income => "income",
            Bucket::Needs => "needs",
            Bucket::Wants => "wants",
            Bucket::Savings => "savings",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Salary,
    Freelance,
    Investment,
    Gift,
    OtherIncome,

    Rent,
    Utilities,
    Groceries,
    Insurance,
    Healthcare,
    Transportation,

    Dining,
    Entertainment,
    Shopping,
    Travel,
    Hobbies,
    Subscriptions,

    EmergencyFund,
    Investments,
    Retirement,
    SavingsGoal,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 21] = [
        TransactionCategory::Salary,
        TransactionCategory::Freelance,
        TransactionCategory::Investment,
        TransactionCategory::Gift,
        TransactionCategory::OtherIncome,
        TransactionCategory::Rent,
        TransactionCategory::Utilities,
        TransactionCategory::Groceries,
        TransactionCategory::Insurance,
        TransactionCategory::Healthcare,
        TransactionCategory::Transportation,
        TransactionCategory::Dining,
        TransactionCategory::Entertainment,
        TransactionCategory::Shopping,
        TransactionCategory::Travel,
        TransactionCategory::Hobbies,
        TransactionCategory::Subscriptions,
        TransactionCategory::EmergencyFund,
        TransactionCategory::Investments,
        TransactionCategory::Retirement,
        TransactionCategory::SavingsGoal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Salary => "salary",
            TransactionCategory::Freelance => "freelance",
            TransactionCategory::Investment => "investment",
            TransactionCategory::Gift => "gift",
            TransactionCategory::OtherIncome => "other_income",
            TransactionCategory::Rent => "rent",
            TransactionCategory::Utilities => "utilities",
            TransactionCategory::Groceries => "groceries",
            TransactionCategory::Insurance => "insurance",
            TransactionCategory::Healthcare => "healthcare",
            TransactionCategory::Transportation => "transportation",
            TransactionCategory::Dining => "dining",
            TransactionCategory::Entertainment => "entertainment",
            TransactionCategory::Shopping => "shopping",
            TransactionCategory::Travel => "travel",
            TransactionCategory::Hobbies => "hobbies",
            TransactionCategory::Subscriptions => "subscriptions",
            TransactionCategory::EmergencyFund => "emergency_fund",
            TransactionCategory::Investments => "investments",
            TransactionCategory::Retirement => "retirement",
            TransactionCategory::SavingsGoal => "savings_goal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == needle)
    }

    pub fn bucket(&self) -> Bucket {
        use TransactionCategory::*;
        match self {
            Salary | Freelance | Investment | Gift | OtherIncome => Bucket::Income,
            Rent | Utilities | Groceries | Insurance | Healthcare | Transportation => Bucket::Needs,
            Dining | Entertainment | Shopping | Travel | Hobbies | Subscriptions => Bucket::Wants,
            EmergencyFund | Investments | Retirement | SavingsGoal => Bucket::Savings,
        }
    }

    pub fn is_income_category(&self) -> bool {
        self.bucket() == Bucket::Income
    }
}

impl std::fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
